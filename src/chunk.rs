//! Overlapping fixed-size text chunker.
//!
//! Splits document text into windows of at most `chunk_size` characters.
//! Before cutting, the chunker searches backward inside the window for the
//! last sentence terminator (`.`) or newline and cuts there when it falls
//! past the window's midpoint, so chunks tend to end on sentence boundaries.
//! Successive chunks overlap by `overlap` characters to preserve context
//! across boundaries.

use anyhow::{bail, Result};

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Empty input yields an empty vector. Chunks are trimmed of surrounding
/// whitespace; chunks that trim to nothing are dropped.
///
/// # Errors
///
/// `chunk_size == 0` or `overlap >= chunk_size` cannot make forward
/// progress and are rejected as configuration errors.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if overlap >= chunk_size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            overlap,
            chunk_size
        );
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let window_end = start + chunk_size;
        let mut end = window_end.min(chars.len());

        // Prefer a sentence/line boundary, but only when it lies past the
        // midpoint of the window; earlier breaks would produce tiny chunks.
        if window_end < chars.len() {
            if let Some(rel) = chars[start..end].iter().rposition(|&c| c == '.' || c == '\n') {
                if (rel as f64) > chunk_size as f64 * 0.5 {
                    end = start + rel + 1;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if window_end >= chars.len() {
            break;
        }
        // A boundary cut can land inside the overlap window; clamp so the
        // next start always advances.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    Ok(chunks)
}
