use std::path::PathBuf;

use thiserror::Error;

use crate::chunk::ChunkId;
use crate::embedding::EmbeddingError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chunk not found: {id}")]
    NotFound { id: ChunkId },

    #[error("duplicate chunk id: {id}")]
    DuplicateId { id: ChunkId },

    #[error("failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The embedder returned a vector whose length differs from its declared dimension.
    #[error("chunk {id} embedded to {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        id: ChunkId,
        expected: usize,
        actual: usize,
    },

    /// A batch embedding call returned a different number of vectors than texts it was given.
    #[error("embedder returned {actual} vectors for a batch of {expected} starting at {first}")]
    EmbeddingCountMismatch {
        first: ChunkId,
        expected: usize,
        actual: usize,
    },

    /// The index was built by a different embedder than the one it is queried with.
    #[error(
        "index built with {index_model} ({index_dim} dims) cannot be queried with {embedder_model} ({embedder_dim} dims)"
    )]
    EmbedderMismatch {
        index_model: String,
        index_dim: usize,
        embedder_model: String,
        embedder_dim: usize,
    },

    #[error("snapshot not found: {path}")]
    SnapshotNotFound { path: PathBuf },

    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("corrupt snapshot: {reason}")]
    Corrupt { reason: String },

    #[error("snapshot serialization failed: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Errors that mean the index and the running configuration cannot work together at all,
    /// as opposed to a missing chunk or a transient I/O failure.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::EmbedderMismatch { .. }
                | Self::DimensionMismatch { .. }
                | Self::EmbeddingCountMismatch { .. }
                | Self::UnsupportedVersion { .. }
                | Self::Corrupt { .. }
        )
    }
}
