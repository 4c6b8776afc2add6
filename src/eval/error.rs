use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to read dataset {path}: {source}")]
    ReadDataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("question {index} has an empty query")]
    EmptyQuery { index: usize },

    /// The pipeline failed its startup checks; no question was run.
    #[error("pipeline preflight failed: {0}")]
    Preflight(#[source] PipelineError),

    /// A configuration error surfaced; the run stops without producing metrics.
    #[error("evaluation aborted at question {index}: {source}")]
    Fatal {
        index: usize,
        #[source]
        source: PipelineError,
    },

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("failed to write report {path}: {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type EvalResult<T> = Result<T, EvalError>;
