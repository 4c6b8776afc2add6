use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("language model call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("language model provider error: {0}")]
    Provider(String),

    #[error("language model returned an empty response")]
    EmptyResponse,
}
