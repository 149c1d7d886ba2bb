//! Configuration management for RISOTTO
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! Every field has a default, so an empty configuration is valid.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Artifact storage configuration
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Importance propagation configuration
    #[serde(default)]
    pub importance: ImportanceConfig,

    /// Text preprocessing configuration
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Entailment scoring configuration
    #[serde(default)]
    pub entailment: EntailmentConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Ranking defaults
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Batch job retry policy
    #[serde(default)]
    pub batch: BatchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
    /// Directory holding persisted tables
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportanceConfig {
    /// Damping factor (probability of following a citation)
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Maximum power iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// L1 convergence tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

/// Unit of text handed to a relevance engine
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// The whole abstract as one unit
    #[default]
    Abstract,
    /// One unit per blank-line separated paragraph
    Paragraphs,
    /// One unit per sentence
    Sentences,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub granularity: Granularity,

    /// Maximum characters per unit (model input budget)
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

/// How per-unit entailment probabilities become a document score
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Max,
    Mean,
}

/// Entailment classifier implementation behind a backend
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// JSON inference endpoint serving an MNLI model
    #[default]
    Http,
    /// Term-overlap heuristic; always stored as the "lexical" table
    Lexical,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntailmentBackendConfig {
    /// Backend name, used as the relevance table version
    pub name: String,

    #[serde(default)]
    pub kind: ClassifierKind,

    /// Inference endpoint, required for `http` backends
    pub endpoint: Option<String>,

    /// Model identifier sent to the endpoint
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntailmentConfig {
    /// Fixed hypothesis every document is tested against
    #[serde(default = "default_hypothesis")]
    pub hypothesis: String,

    #[serde(default)]
    pub aggregation: Aggregation,

    /// Renormalise over {entailment, contradiction}, discarding neutral
    #[serde(default)]
    pub ignore_neutral: bool,

    /// Premise/hypothesis pairs per classifier call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Documents scored concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout in seconds for HTTP backends
    #[serde(default = "default_entailment_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_entailment_backends")]
    pub backends: Vec<EntailmentBackendConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds (batch calls)
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Timeout for embedding a live query, in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Prepended to every query before embedding
    #[serde(default = "default_query_prefix")]
    pub query_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Maximum papers returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Default cosine similarity threshold
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Default entailment threshold (percent)
    #[serde(default = "default_entailment_threshold")]
    pub entailment_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Retries per stage after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_artifacts_dir() -> PathBuf { PathBuf::from("./artifacts") }
fn default_damping() -> f64 { 0.85 }
fn default_max_iterations() -> usize { 100 }
fn default_tolerance() -> f64 { 1e-8 }
fn default_max_input_chars() -> usize { 2048 }
fn default_hypothesis() -> String { "This paper is about vaccines and therapeutics.".to_string() }
fn default_batch_size() -> usize { 16 }
fn default_concurrency() -> usize { 4 }
fn default_entailment_timeout() -> u64 { 60 }
fn default_entailment_backends() -> Vec<EntailmentBackendConfig> {
    vec![
        EntailmentBackendConfig {
            name: "bart".to_string(),
            kind: ClassifierKind::Http,
            endpoint: None,
            model: Some("facebook/bart-large-mnli".to_string()),
        },
        EntailmentBackendConfig {
            name: "bert".to_string(),
            kind: ClassifierKind::Http,
            endpoint: None,
            model: Some("textattack/bert-base-uncased-MNLI".to_string()),
        },
    ]
}
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { "bert-base-nli-mean-tokens".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_query_timeout_ms() -> u64 { 2_000 }
fn default_query_prefix() -> String { "What do we know about".to_string() }
fn default_top_k() -> usize { 20 }
fn default_similarity_threshold() -> f64 { 0.65 }
fn default_entailment_threshold() -> f64 { 85.0 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_secs() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "risotto".to_string() }

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self { dir: default_artifacts_dir() }
    }
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl Default for EntailmentConfig {
    fn default() -> Self {
        Self {
            hypothesis: default_hypothesis(),
            aggregation: Aggregation::default(),
            ignore_neutral: false,
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            timeout_secs: default_entailment_timeout(),
            backends: default_entailment_backends(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            query_timeout_ms: default_query_timeout_ms(),
            batch_size: default_batch_size(),
            query_prefix: default_query_prefix(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            entailment_threshold: default_entailment_threshold(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactsConfig::default(),
            importance: ImportanceConfig::default(),
            preprocess: PreprocessConfig::default(),
            entailment: EntailmentConfig::default(),
            embedding: EmbeddingConfig::default(),
            ranking: RankingConfig::default(),
            batch: BatchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__IMPORTANCE__DAMPING=0.9
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific configuration file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Look up an entailment backend by name
    pub fn entailment_backend(&self, name: &str) -> Option<&EntailmentBackendConfig> {
        self.entailment
            .backends
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.importance.damping, 0.85);
        assert_eq!(config.importance.max_iterations, 100);
        assert_eq!(config.ranking.top_k, 20);
        assert_eq!(config.embedding.query_prefix, "What do we know about");
    }

    #[test]
    fn test_empty_source_matches_default() {
        let config: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let default = AppConfig::default();
        assert_eq!(config.ranking.similarity_threshold, default.ranking.similarity_threshold);
        assert_eq!(config.entailment.backends.len(), 2);
        assert_eq!(config.preprocess.granularity, Granularity::Abstract);
    }

    #[test]
    fn test_backend_kind_defaults_to_http() {
        let toml = r#"
            [[entailment.backends]]
            name = "offline"
            kind = "lexical"

            [[entailment.backends]]
            name = "bart"
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.entailment.backends[0].kind, ClassifierKind::Lexical);
        assert_eq!(config.entailment.backends[1].kind, ClassifierKind::Http);
        assert!(config.entailment.backends[1].endpoint.is_none());
    }

    #[test]
    fn test_backend_lookup_is_case_insensitive() {
        let config = AppConfig::default();
        assert!(config.entailment_backend("BART").is_some());
        assert!(config.entailment_backend("roberta").is_none());
    }
}
