use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_MAX_SEQ_LEN;

use super::error::CrossEncoderError;

/// Files a fine-tuned cross-encoder directory must contain.
pub const REQUIRED_MODEL_FILES: [&str; 3] = ["config.json", "model.safetensors", "tokenizer.json"];

#[derive(Debug, Clone)]
pub struct CrossEncoderConfig {
    /// Model directory. `None` selects the token-overlap stub.
    pub model_path: Option<PathBuf>,
    /// Query and candidate are truncated together to this many tokens.
    pub max_seq_len: usize,
}

impl Default for CrossEncoderConfig {
    fn default() -> Self {
        Self::stub()
    }
}

impl CrossEncoderConfig {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: Some(model_path.into()),
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
        }
    }

    pub fn stub() -> Self {
        Self {
            model_path: None,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
        }
    }

    pub fn with_max_seq_len(mut self, max_seq_len: usize) -> Self {
        self.max_seq_len = max_seq_len;
        self
    }

    pub fn validate(&self) -> Result<(), CrossEncoderError> {
        if self.max_seq_len == 0 {
            return Err(CrossEncoderError::InvalidConfig {
                reason: "max_seq_len must be positive".to_string(),
            });
        }
        if let Some(path) = &self.model_path
            && path.as_os_str().is_empty()
        {
            return Err(CrossEncoderError::InvalidConfig {
                reason: "model_path cannot be empty when provided".to_string(),
            });
        }
        Ok(())
    }
}

/// First entry of [`REQUIRED_MODEL_FILES`] absent from `dir`.
pub(super) fn first_missing_file(dir: &Path) -> Option<&'static str> {
    REQUIRED_MODEL_FILES
        .into_iter()
        .find(|name| !dir.join(name).exists())
}
