//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
///
/// Every variant is fatal: a pipeline refuses to start on any of them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Fusion weight must lie in `[0, 1]`.
    #[error("fusion alpha {value} is outside [0, 1]")]
    InvalidFusionAlpha { value: f32 },

    #[error("name boost {value} must be finite and non-negative")]
    InvalidNameBoost { value: f32 },

    /// Boosting is on but the bonus would leave every score unchanged.
    #[error("name boost must be positive while function name boosting is enabled")]
    ZeroNameBoost,

    /// File-versus-function blend weight must lie in `[0, 1]`.
    #[error("file weight {value} is outside [0, 1]")]
    InvalidFileWeight { value: f32 },

    #[error("candidate pool size must be at least 1")]
    EmptyCandidatePool,

    /// Batch prompts label candidates `B..=Z`.
    #[error("batch ranking size {value} must be between 1 and {max}")]
    InvalidBatchSize { value: usize, max: usize },

    #[error("{name} must be at least 1")]
    ZeroWorkers { name: &'static str },

    #[error("BM25 parameter {name}={value} is out of range")]
    InvalidBm25 { name: &'static str, value: f32 },

    #[error("unknown LLM selection mode '{value}'")]
    UnknownSelectionMode { value: String },

    #[error("unknown file aggregation strategy '{value}'")]
    UnknownAggregation { value: String },

    /// The loaded index and the embedder disagree on vector length.
    #[error("embedding dimension mismatch: index has {expected}, embedder produces {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The fine-tuned model was requested but its directory is not configured.
    #[error("use_finetuned is set but {name} is not")]
    MissingFinetunedModel { name: &'static str },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
