//! Error types for RISOTTO
//!
//! Provides a single error enum shared by the batch builder and the query
//! side, with:
//! - Distinct error types for different failure modes
//! - Machine-readable error codes
//! - Retry classification for the job orchestration layer
//!
//! Conditions that are not failures (rows dropped by a join, malformed records
//! skipped during ingestion, PageRank hitting its iteration cap) are reported
//! through result types, never through this enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,
    MalformedDocument,

    // Artifact errors (4xxx)
    ArtifactNotFound,
    EmbeddingModelMismatch,
    DimensionMismatch,

    // Scoring errors (5xxx)
    NonPositiveScore,

    // Storage errors (7xxx)
    StorageError,

    // External model errors (8xxx)
    ModelUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::MalformedDocument => 1004,

            ErrorCode::ArtifactNotFound => 4001,
            ErrorCode::EmbeddingModelMismatch => 4002,
            ErrorCode::DimensionMismatch => 4003,

            ErrorCode::NonPositiveScore => 5001,

            ErrorCode::StorageError => 7001,

            ErrorCode::ModelUnavailable => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Malformed document at record {record}: {message}")]
    MalformedDocument { record: usize, message: String },

    // Artifact errors
    #[error("Artifact not found: {table}")]
    ArtifactNotFound { table: String },

    #[error("Embedding model mismatch: table built with '{expected}', query embedder is '{actual}'")]
    EmbeddingModelMismatch { expected: String, actual: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Scoring errors
    #[error("Importance score for '{id}' is not strictly positive ({score})")]
    NonPositiveScore { id: String, score: f64 },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    // External model errors
    #[error("Model backend '{backend}' unavailable: {message}")]
    ModelUnavailable { backend: String, message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a backend failure
    pub fn model_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ModelUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::MalformedDocument { .. } => ErrorCode::MalformedDocument,
            AppError::ArtifactNotFound { .. } => ErrorCode::ArtifactNotFound,
            AppError::EmbeddingModelMismatch { .. } => ErrorCode::EmbeddingModelMismatch,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::NonPositiveScore { .. } => ErrorCode::NonPositiveScore,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::ModelUnavailable { .. } => ErrorCode::ModelUnavailable,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a batch job may retry the operation that produced this error.
    ///
    /// Components never retry internally; the orchestration layer decides.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ModelUnavailable { .. }
                | AppError::ServiceUnavailable { .. }
                | AppError::Storage { .. }
        )
    }

    /// Check if this error was caused by caller input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::InvalidFormat { .. }
                | AppError::MalformedDocument { .. }
                | AppError::ArtifactNotFound { .. }
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}
