use thiserror::Error;

use crate::embedding::error::EmbeddingError;

/// Failures of the `(query, candidate)` scorer.
///
/// [`NotAvailable`](Self::NotAvailable) is what the re-ranker reports as a model-unavailable
/// query failure; the other variants surface as ordinary scoring errors.
#[derive(Debug, Error)]
pub enum CrossEncoderError {
    #[error("cross-encoder failed to load: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("cross-encoder forward pass failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize pair: {reason}")]
    TokenizationFailed { reason: String },

    #[error("invalid cross-encoder configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("cross-encoder unavailable: {reason}")]
    NotAvailable { reason: String },
}

impl From<candle_core::Error> for CrossEncoderError {
    fn from(err: candle_core::Error) -> Self {
        Self::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<EmbeddingError> for CrossEncoderError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DeviceUnavailable { device, reason } => {
                Self::DeviceUnavailable { device, reason }
            }
            EmbeddingError::TokenizationFailed { reason } => Self::TokenizationFailed { reason },
            other => Self::InferenceFailed {
                reason: other.to_string(),
            },
        }
    }
}
