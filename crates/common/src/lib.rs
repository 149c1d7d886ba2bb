//! RISOTTO Common Library
//!
//! Shared code for the RISOTTO batch builder and query side including:
//! - Document and score table models
//! - Embedding and entailment backend abstractions
//! - Error types and handling
//! - Configuration management
//! - Artifact storage and the immutable table cache
//! - Text preprocessing
//! - Metrics and tracing setup

pub mod cache;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod nli;
pub mod storage;
pub mod telemetry;
pub mod text;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{Document, DocumentId};
pub use nli::EntailmentClassifier;
pub use storage::Artifacts;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
