use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Snapshot stem; `save` writes `<snapshot>.index` and `<snapshot>.data`.
    pub snapshot: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrievalConfig {
    /// Result count when the caller does not specify `k`.
    #[serde(default = "default_k")]
    pub default_k: usize,
    /// Candidate multiplier applied when metadata filters are active,
    /// compensating for post-filter attrition.
    #[serde(default = "default_filter_overfetch")]
    pub filter_overfetch: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            filter_overfetch: default_filter_overfetch(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_filter_overfetch() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// One dataset to ingest, with its schema hints.
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub name: String,
    #[serde(default = "default_text_column")]
    pub text_column: String,
    #[serde(default)]
    pub lesson_id_column: Option<String>,
    #[serde(default)]
    pub person_id_column: Option<String>,
}

fn default_text_column() -> String {
    "text".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking: overlap >= chunk_size cannot make forward progress.
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.default_k == 0 {
        anyhow::bail!("retrieval.default_k must be >= 1");
    }
    if config.retrieval.filter_overfetch == 0 {
        anyhow::bail!("retrieval.filter_overfetch must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is 'openai'");
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'openai'");
            }
        }
        "local" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or disabled.",
            other
        ),
    }

    // Validate datasets
    for ds in &config.datasets {
        if ds.name.trim().is_empty() {
            anyhow::bail!("datasets entry {} has an empty name", ds.path.display());
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eco.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (dir, path)
    }

    const BASE: &str = r#"
[store]
snapshot = "/tmp/eco/store"

[server]
bind = "127.0.0.1:7332"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let (_dir, path) = write_config(BASE);
        let config = load_config(&path).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.default_k, 5);
        assert_eq!(config.retrieval.filter_overfetch, 3);
        assert_eq!(config.embedding.provider, "local");
        assert!(config.datasets.is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let body = format!("{BASE}\n[chunking]\nchunk_size = 100\noverlap = 100\n");
        let (_dir, path) = write_config(&body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn openai_provider_requires_model_and_dims() {
        let body = format!("{BASE}\n[embedding]\nprovider = \"openai\"\n");
        let (_dir, path) = write_config(&body);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn datasets_parse_with_schema_hints() {
        let body = format!(
            r#"{BASE}
[[datasets]]
path = "dataset/GlobalLandTemperaturesByCountry.csv"
name = "temperature_by_country"

[[datasets]]
path = "dataset/climate_headlines_sentiment.csv"
name = "climate_headlines"
text_column = "Content"
"#
        );
        let (_dir, path) = write_config(&body);
        let config = load_config(&path).unwrap();
        assert_eq!(config.datasets.len(), 2);
        assert_eq!(config.datasets[0].text_column, "text");
        assert_eq!(config.datasets[1].text_column, "Content");
    }

    #[test]
    fn unknown_provider_rejected() {
        let body = format!("{BASE}\n[embedding]\nprovider = \"quantum\"\n");
        let (_dir, path) = write_config(&body);
        assert!(load_config(&path).is_err());
    }
}
