use thiserror::Error;

use crate::chunk::ChunkId;
use crate::embedding::CrossEncoderError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RerankError {
    /// The cross-encoder never loaded. Raised before any candidate is scored.
    #[error("re-ranker model unavailable")]
    ModelUnavailable,

    #[error("failed to score candidate {id}: {source}")]
    Scoring {
        id: ChunkId,
        #[source]
        source: CrossEncoderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("scoring task failed: {0}")]
    TaskFailed(String),
}

pub type RerankResult<T> = Result<T, RerankError>;
