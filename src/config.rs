use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Dedup tie-break order: earlier sources win.
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results_per_source: usize,
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,
    /// Minimum gap between two requests to the same source, in milliseconds.
    #[serde(default = "default_min_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            max_results_per_source: default_max_results(),
            adapter_timeout_secs: default_adapter_timeout_secs(),
            min_request_interval_ms: default_min_interval_ms(),
        }
    }
}

fn default_priority() -> Vec<String> {
    vec![
        "arxiv".to_string(),
        "semantic_scholar".to_string(),
        "wikipedia".to_string(),
    ]
}
fn default_max_results() -> usize {
    10
}
fn default_adapter_timeout_secs() -> u64 {
    30
}
fn default_min_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    /// Fraction of the window carried over into the next chunk.
    #[serde(default = "default_overlap_fraction")]
    pub overlap_fraction: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_fraction: default_overlap_fraction(),
        }
    }
}

fn default_window_chars() -> usize {
    800
}
fn default_overlap_fraction() -> f64 {
    0.15
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results per subtopic after filtering.
    #[serde(default = "default_per_subtopic_limit")]
    pub per_subtopic_limit: usize,
    /// Chunks farther than this are excluded; an emptied result set marks
    /// the subtopic as a research gap.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_subtopic_limit: default_per_subtopic_limit(),
            max_distance: default_max_distance(),
        }
    }
}

fn default_per_subtopic_limit() -> usize {
    5
}
fn default_max_distance() -> f32 {
    1.2
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
            provider: "openai".to_string(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(1536),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
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
pub struct ReportConfig {
    /// How many key themes to list in the report header.
    #[serde(default = "default_top_themes")]
    pub top_themes: usize,
    /// Sentences taken per supporting chunk by the extractive summarizer.
    #[serde(default = "default_sentences_per_chunk")]
    pub sentences_per_chunk: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_themes: default_top_themes(),
            sentences_per_chunk: default_sentences_per_chunk(),
        }
    }
}

fn default_top_themes() -> usize {
    10
}
fn default_sentences_per_chunk() -> usize {
    2
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.window_chars == 0 {
        anyhow::bail!("chunking.window_chars must be > 0");
    }

    if !(0.0..0.5).contains(&config.chunking.overlap_fraction) {
        anyhow::bail!("chunking.overlap_fraction must be in [0.0, 0.5)");
    }

    if config.retrieval.per_subtopic_limit == 0 {
        anyhow::bail!("retrieval.per_subtopic_limit must be >= 1");
    }

    if config.retrieval.max_distance < 0.0 {
        anyhow::bail!("retrieval.max_distance must be >= 0");
    }

    if config.sources.priority.is_empty() {
        anyhow::bail!("sources.priority must list at least one source");
    }

    if config.sources.max_results_per_source == 0 {
        anyhow::bail!("sources.max_results_per_source must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified for provider 'openai'");
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 for provider 'openai'");
            }
        }
        other => anyhow::bail!("Unknown embedding provider: '{}'. Must be openai.", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
    }

    #[test]
    fn test_rejects_zero_window() {
        let mut config = Config::default();
        config.chunking.window_chars = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_overlap_out_of_range() {
        let mut config = Config::default();
        config.chunking.overlap_fraction = 0.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_priority() {
        let mut config = Config::default();
        config.sources.priority.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            window_chars = 512

            [retrieval]
            per_subtopic_limit = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.window_chars, 512);
        assert_eq!(config.retrieval.per_subtopic_limit, 8);
        // Untouched tables keep their defaults
        assert_eq!(config.sources.priority.len(), 3);
        assert_eq!(config.embedding.batch_size, 64);
    }
}
