use std::path::PathBuf;

use thiserror::Error;

/// Failures of the bi-encoder that embeds chunks and queries.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("no embedding model at {path}")]
    ModelNotFound { path: PathBuf },

    #[error("embedding model failed to load: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// Forward pass or pooling failed for one input.
    #[error("embedding forward pass failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize input: {reason}")]
    TokenizationFailed { reason: String },

    #[error("invalid encoder configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A backend produced a vector of the wrong length.
    #[error("embedder produced {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<candle_core::Error> for EmbeddingError {
    fn from(err: candle_core::Error) -> Self {
        Self::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for EmbeddingError {
    fn from(err: std::io::Error) -> Self {
        Self::ModelLoadFailed {
            reason: err.to_string(),
        }
    }
}
