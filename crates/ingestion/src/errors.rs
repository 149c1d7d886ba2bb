//! Batch build error types

use risotto_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read corpus {path}: {source}")]
    CorpusRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown entailment backend: {0}")]
    UnknownBackend(String),

    #[error("Stage '{stage}' failed after {attempts} attempt(s): {source}")]
    StageFailed {
        stage: String,
        attempts: u32,
        #[source]
        source: AppError,
    },

    #[error(transparent)]
    App(#[from] AppError),
}

impl IngestionError {
    /// Wrap a stage failure with the number of attempts made
    pub fn stage(stage: impl Into<String>, attempts: u32, source: AppError) -> Self {
        IngestionError::StageFailed {
            stage: stage.into(),
            attempts,
            source,
        }
    }
}
