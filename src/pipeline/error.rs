use thiserror::Error;

use crate::config::ConfigError;
use crate::embedding::EmbeddingError;
use crate::rerank::RerankError;
use crate::store::StoreError;
use crate::vector::VectorError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("index error: {0}")]
    Store(#[from] StoreError),

    #[error("vector scoring failed: {0}")]
    Vector(#[from] VectorError),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("re-ranking failed: {0}")]
    Rerank(#[from] RerankError),

    #[error("query cancelled")]
    Cancelled,

    #[error("pipeline task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    /// `true` for errors that will recur on every query until the configuration changes.
    /// An evaluation run aborts on these; anything else is counted as a per-query failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Vector(VectorError::DimensionMismatch { .. }) => true,
            Self::Embedding(EmbeddingError::DimensionMismatch { .. }) => true,
            Self::Store(e) => e.is_config_error(),
            Self::Rerank(RerankError::Store(e)) => e.is_config_error(),
            _ => false,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
