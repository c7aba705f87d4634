//! Flat exact nearest-neighbor index over squared Euclidean distance.
//!
//! Vectors are stored contiguously in insertion order; search is an
//! exhaustive linear scan. Correctness over speed: the corpus here is tens
//! of thousands of chunks, where an exact scan is both fast enough and
//! fully deterministic (ties break toward the lower insertion index).
//!
//! The index is append-only: no removal, no rebuild, no approximation.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::embedding::{blob_to_vec, vec_to_blob};

/// Snapshot file magic (`ECIX`) and format version.
const SNAPSHOT_MAGIC: &[u8; 4] = b"ECIX";
const SNAPSHOT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Append-only flat vector index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    // Row-major: vector i occupies data[i*dims .. (i+1)*dims].
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for `dims`-dimensional vectors.
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            bail!("vector index dimension must be > 0");
        }
        Ok(Self {
            dims,
            data: Vec::new(),
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors; index position equals insertion order.
    ///
    /// # Errors
    ///
    /// Any vector whose length differs from the index dimension is a fatal
    /// configuration error; nothing is appended in that case.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != self.dims {
                bail!(
                    "vector {} has dimension {} but the index expects {}",
                    i,
                    v.len(),
                    self.dims
                );
            }
        }
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Exact k-nearest-neighbor search.
    ///
    /// Returns up to `k` `(index, squared_distance)` pairs in ascending
    /// distance order; for `k` larger than the index, returns everything.
    /// Equal distances are ordered by insertion index, so results are
    /// stable across runs.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            bail!(
                "query has dimension {} but the index expects {}",
                query.len(),
                self.dims
            );
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| {
                let row = &self.data[i * self.dims..(i + 1) * self.dims];
                let dist: f32 = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (i, dist)
            })
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Write the index to a binary snapshot file.
    ///
    /// Layout: magic, format version, dims (u32), count (u64), then the
    /// vectors as little-endian f32 bytes.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&vec_to_blob(&self.data));
        fs::write(path, bytes)
            .with_context(|| format!("Failed to write index snapshot: {}", path.display()))?;
        Ok(())
    }

    /// Load an index from a snapshot written by [`FlatIndex::save`].
    ///
    /// Fails fast on a bad magic, unsupported version, or a payload whose
    /// length disagrees with the header.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read index snapshot: {}", path.display()))?;
        if bytes.len() < HEADER_LEN {
            bail!("index snapshot is truncated: {}", path.display());
        }
        if &bytes[0..4] != SNAPSHOT_MAGIC {
            bail!("not an index snapshot: {}", path.display());
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != SNAPSHOT_VERSION {
            bail!("unsupported index snapshot version: {}", version);
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let count = u64::from_le_bytes([
            bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
        ]) as usize;
        if dims == 0 {
            bail!("index snapshot has zero dimension: {}", path.display());
        }

        let payload = &bytes[HEADER_LEN..];
        if payload.len() != count * dims * 4 {
            bail!(
                "index snapshot payload mismatch: expected {} vectors of dim {}, found {} bytes",
                count,
                dims,
                payload.len()
            );
        }

        Ok(Self {
            dims,
            data: blob_to_vec(payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::new(2).unwrap();
        index
            .add(&[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 2.0],
                vec![3.0, 3.0],
            ])
            .unwrap();
        index
    }

    #[test]
    fn zero_dims_rejected() {
        assert!(FlatIndex::new(0).is_err());
    }

    #[test]
    fn add_tracks_insertion_order() {
        let index = sample_index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dims(), 2);
    }

    #[test]
    fn dimension_mismatch_on_add_is_fatal() {
        let mut index = FlatIndex::new(2).unwrap();
        assert!(index.add(&[vec![1.0, 2.0, 3.0]]).is_err());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn dimension_mismatch_on_search_is_fatal() {
        let index = sample_index();
        assert!(index.search(&[1.0], 2).is_err());
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let index = sample_index();
        let hits = index.search(&[0.9, 0.0], 4).unwrap();
        let order: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 0, 2, 3]);
        for pair in hits.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn distances_are_squared_euclidean() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].0, 0);
        assert!((hits[0].1 - 0.0).abs() < 1e-6);
        let hits = index.search(&[3.0, 0.0], 4).unwrap();
        let by_idx: std::collections::HashMap<usize, f32> = hits.into_iter().collect();
        assert!((by_idx[&3] - 9.0).abs() < 1e-6); // (3-3)^2 + (0-3)^2
    }

    #[test]
    fn k_larger_than_index_returns_all() {
        let index = sample_index();
        assert_eq!(index.search(&[0.0, 0.0], 100).unwrap().len(), 4);
    }

    #[test]
    fn k_zero_returns_empty() {
        let index = sample_index();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_break_toward_lower_insertion_index() {
        let mut index = FlatIndex::new(1).unwrap();
        index
            .add(&[vec![1.0], vec![-1.0], vec![1.0], vec![-1.0]])
            .unwrap();
        let hits = index.search(&[0.0], 4).unwrap();
        let order: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_index_search_returns_empty() {
        let index = FlatIndex::new(3).unwrap();
        assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.index");

        let index = sample_index();
        index.save(&path).unwrap();
        let loaded = FlatIndex::load(&path).unwrap();

        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dims(), index.dims());
        assert_eq!(
            loaded.search(&[0.9, 0.0], 4).unwrap(),
            index.search(&[0.9, 0.0], 4).unwrap()
        );
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.index");

        std::fs::write(&path, b"garbage").unwrap();
        assert!(FlatIndex::load(&path).is_err());

        // Valid header, truncated payload.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ECIX");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&5u64.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        std::fs::write(&path, bytes).unwrap();
        assert!(FlatIndex::load(&path).is_err());
    }
}
