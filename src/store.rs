//! The retrieval store: documents, metadata, and a vector index held as
//! parallel arrays.
//!
//! Position `i` in `documents`, `metadata`, and the index always refers to
//! the same chunk. Every mutation embeds first and appends to all three
//! arrays only after the fallible steps succeed, so a failed batch leaves
//! the store exactly as it was.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::{expand_country_records, is_country_temperature_schema};
use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config, DatasetConfig};
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::index::FlatIndex;
use crate::loader::load_records;
use crate::models::{Metadata, MetadataFilter, Retrieved};
use crate::normalize::{build_metadata, synthesize_text, DatasetOptions};

/// Row cap for datasets that do not qualify for per-country aggregation.
/// Large raw tables are sampled head-first rather than embedded wholesale.
const SAMPLE_LIMIT: usize = 1000;

/// Counters reported after ingesting one dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub dataset_name: String,
    pub records_read: usize,
    pub records_indexed: usize,
    pub records_skipped: usize,
    pub chunks_added: usize,
    pub aggregated: bool,
}

/// Store health summary, as served by `/status` and the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub documents: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub datasets: BTreeMap<String, usize>,
}

/// Sidecar JSON written next to the binary index snapshot.
#[derive(Serialize, Deserialize)]
struct SnapshotData {
    documents: Vec<String>,
    metadata: Vec<Metadata>,
    dimension: usize,
    embedding_model: String,
}

pub struct RetrievalStore {
    provider: Box<dyn EmbeddingProvider>,
    index: FlatIndex,
    documents: Vec<String>,
    metadata: Vec<Metadata>,
    chunking: ChunkingConfig,
    batch_size: usize,
    filter_overfetch: usize,
}

impl RetrievalStore {
    /// Create an empty store from configuration, constructing the embedding
    /// provider and sizing the index to its dimensionality.
    pub fn new(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Self::with_provider(provider, config)
    }

    /// Create an empty store around an existing provider. Used by `load`
    /// and by tests that inject a deterministic provider.
    pub fn with_provider(provider: Box<dyn EmbeddingProvider>, config: &Config) -> Result<Self> {
        let index = FlatIndex::new(provider.dims())?;
        Ok(Self {
            provider,
            index,
            documents: Vec::new(),
            metadata: Vec::new(),
            chunking: config.chunking,
            batch_size: config.embedding.batch_size.max(1),
            filter_overfetch: config.retrieval.filter_overfetch.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embed `texts` and append them with their metadata.
    ///
    /// Texts and metadata must be the same length. On error nothing is
    /// appended.
    pub async fn add_documents(
        &mut self,
        texts: Vec<String>,
        metadata: Vec<Metadata>,
    ) -> Result<()> {
        if texts.len() != metadata.len() {
            bail!(
                "Document/metadata count mismatch: {} texts, {} metadata entries",
                texts.len(),
                metadata.len()
            );
        }
        if texts.is_empty() {
            return Ok(());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .provider
                .embed(batch)
                .await
                .context("Failed to embed document batch")?;
            if embedded.len() != batch.len() {
                bail!(
                    "Embedding provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                );
            }
            vectors.extend(embedded);
        }

        self.index.add(&vectors)?;
        self.documents.extend(texts);
        self.metadata.extend(metadata);
        Ok(())
    }

    /// Load one dataset file, normalize its records, and index them.
    ///
    /// Country temperature tables are aggregated into per-country narrative
    /// records; other large tables are sampled to the first
    /// [`SAMPLE_LIMIT`] rows.
    pub async fn ingest_dataset(&mut self, dataset: &DatasetConfig) -> Result<IngestReport> {
        let mut report = IngestReport {
            dataset_name: dataset.name.clone(),
            ..Default::default()
        };

        let mut records = load_records(&dataset.path)
            .with_context(|| format!("Failed to load dataset '{}'", dataset.name))?;
        report.records_read = records.len();

        if is_country_temperature_schema(&records) {
            records = expand_country_records(&records);
            report.aggregated = true;
        } else if records.len() > SAMPLE_LIMIT {
            println!(
                "  dataset '{}': sampling first {} of {} rows",
                dataset.name,
                SAMPLE_LIMIT,
                records.len()
            );
            records.truncate(SAMPLE_LIMIT);
        }

        let opts = DatasetOptions {
            dataset_name: dataset.name.clone(),
            text_field: dataset.text_column.clone(),
            lesson_id_field: dataset.lesson_id_column.clone(),
            person_id_field: dataset.person_id_column.clone(),
        };

        let mut texts = Vec::new();
        let mut metas = Vec::new();
        for record in &records {
            let text = synthesize_text(record, &opts.text_field);
            if text.trim().is_empty() {
                report.records_skipped += 1;
                continue;
            }

            let meta = build_metadata(record, &opts);

            let chunks = chunk_text(&text, self.chunking.chunk_size, self.chunking.overlap)?;
            for chunk in chunks {
                texts.push(chunk);
                metas.push(meta.clone());
            }
            report.records_indexed += 1;
        }

        report.chunks_added = texts.len();
        self.add_documents(texts, metas).await?;
        Ok(report)
    }

    /// Nearest-neighbor retrieval with optional metadata filtering.
    ///
    /// With an active filter the index is overfetched by a configured
    /// multiplier and candidates are filtered in ascending distance order,
    /// so the result is the k nearest *matching* documents within the
    /// candidate window.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<Retrieved>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.provider.as_ref(), query).await?;
        let search_k = if filter.is_empty() {
            k
        } else {
            k.saturating_mul(self.filter_overfetch)
        }
        .min(self.len());

        let hits = self.index.search(&query_vec, search_k)?;

        let mut results = Vec::with_capacity(k);
        for (idx, distance) in hits {
            if !self.metadata[idx].matches(filter) {
                continue;
            }
            results.push(Retrieved {
                text: self.documents[idx].clone(),
                metadata: self.metadata[idx].clone(),
                distance,
            });
            if results.len() == k {
                break;
            }
        }
        Ok(results)
    }

    /// Retrieve lesson-scoped context as a single prompt-ready string.
    ///
    /// Uses `query` when given, otherwise a generic query naming the lesson
    /// (and person, when scoped). Returns an empty string when nothing
    /// matches.
    pub async fn get_context_for_lesson(
        &self,
        lesson_id: &str,
        person_id: Option<&str>,
        dataset_name: Option<&str>,
        query: Option<&str>,
        k: usize,
    ) -> Result<String> {
        let default_query = match person_id {
            Some(pid) => format!("lesson {lesson_id} person {pid}"),
            None => format!("lesson {lesson_id}"),
        };
        let query = query.unwrap_or(&default_query);

        let filter = MetadataFilter {
            dataset_name: dataset_name.map(str::to_string),
            lesson_id: Some(lesson_id.to_string()),
            person_id: person_id.map(str::to_string),
            ..Default::default()
        };

        let results = self.retrieve(query, k, &filter).await?;
        let joined = results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(joined)
    }

    /// Persist the store as `<stem>.index` (binary vectors) plus
    /// `<stem>.data` (documents and metadata as JSON).
    pub fn save(&self, stem: &Path) -> Result<()> {
        if let Some(parent) = stem.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        self.index.save(&stem.with_extension("index"))?;

        let data = SnapshotData {
            documents: self.documents.clone(),
            metadata: self.metadata.clone(),
            dimension: self.index.dims(),
            embedding_model: self.provider.model_name().to_string(),
        };
        let json = serde_json::to_string(&data).context("Failed to serialize store data")?;
        let data_path = stem.with_extension("data");
        std::fs::write(&data_path, json)
            .with_context(|| format!("Failed to write {}", data_path.display()))?;
        Ok(())
    }

    /// True when both snapshot files exist for `stem`.
    pub fn snapshot_exists(stem: &Path) -> bool {
        stem.with_extension("index").exists() && stem.with_extension("data").exists()
    }

    /// Load a persisted store, reconstructing the embedding provider from
    /// configuration and validating it against the snapshot.
    pub fn load(stem: &Path, config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Self::load_with_provider(stem, provider, config)
    }

    pub fn load_with_provider(
        stem: &Path,
        provider: Box<dyn EmbeddingProvider>,
        config: &Config,
    ) -> Result<Self> {
        let index = FlatIndex::load(&stem.with_extension("index"))?;

        let data_path = stem.with_extension("data");
        let json = std::fs::read_to_string(&data_path)
            .with_context(|| format!("Failed to read {}", data_path.display()))?;
        let data: SnapshotData = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", data_path.display()))?;

        if data.documents.len() != data.metadata.len() || data.documents.len() != index.len() {
            bail!(
                "Corrupt snapshot: {} documents, {} metadata entries, {} vectors",
                data.documents.len(),
                data.metadata.len(),
                index.len()
            );
        }
        if data.dimension != index.dims() {
            bail!(
                "Corrupt snapshot: data says {} dims, index says {}",
                data.dimension,
                index.dims()
            );
        }
        if provider.dims() != index.dims() {
            bail!(
                "Snapshot was built with {} dims ({}), configured provider has {}; \
                 re-ingest or restore the original embedding configuration",
                index.dims(),
                data.embedding_model,
                provider.dims()
            );
        }
        if provider.model_name() != data.embedding_model {
            bail!(
                "Snapshot was built with model '{}', configured model is '{}'; \
                 re-ingest or restore the original embedding configuration",
                data.embedding_model,
                provider.model_name()
            );
        }

        Ok(Self {
            provider,
            index,
            documents: data.documents,
            metadata: data.metadata,
            chunking: config.chunking,
            batch_size: config.embedding.batch_size.max(1),
            filter_overfetch: config.retrieval.filter_overfetch.max(1),
        })
    }

    pub fn status(&self) -> StoreStatus {
        let mut datasets = BTreeMap::new();
        for meta in &self.metadata {
            *datasets.entry(meta.dataset_name.clone()).or_insert(0) += 1;
        }
        StoreStatus {
            documents: self.documents.len(),
            dimension: self.index.dims(),
            embedding_model: self.provider.model_name().to_string(),
            datasets,
        }
    }
}
