//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `CODERANK_*` environment variables.

mod env;
pub mod error;
pub mod pipeline;


pub use error::ConfigError;
pub use pipeline::{FileAggregation, PipelineConfig, SelectionMode};

use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_QUERY_CACHE_CAPACITY;

/// File name of the persisted index inside [`Config::data_dir`].
pub const SNAPSHOT_FILE_NAME: &str = "index.rkyv";

/// Model and storage locations used by the `coderank` binary.
///
/// Use [`Config::from_env`] to read `CODERANK_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the persisted index. Default: `./.data`.
    pub data_dir: PathBuf,

    /// BERT encoder directory (`config.json`, `model.safetensors`, `tokenizer.json`).
    /// Unset means the deterministic stub embedder.
    pub embedder_path: Option<PathBuf>,

    /// Cross-encoder directory. Unset means the token-overlap stub.
    pub cross_encoder_path: Option<PathBuf>,

    /// Cross-encoder used instead of [`cross_encoder_path`](Self::cross_encoder_path) when
    /// `CODERANK_USE_FINETUNED` is on.
    pub finetuned_cross_encoder_path: Option<PathBuf>,

    /// Max memoised query embeddings. Default: `4096`.
    pub query_cache_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.data"),
            embedder_path: None,
            cross_encoder_path: None,
            finetuned_cross_encoder_path: None,
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
        }
    }
}

impl Config {
    const ENV_DATA_DIR: &'static str = "CODERANK_DATA_DIR";
    const ENV_EMBEDDER_PATH: &'static str = "CODERANK_EMBEDDER_PATH";
    const ENV_CROSS_ENCODER_PATH: &'static str = "CODERANK_CROSS_ENCODER_PATH";
    const ENV_FINETUNED_CROSS_ENCODER_PATH: &'static str = "CODERANK_FINETUNED_CROSS_ENCODER_PATH";
    const ENV_QUERY_CACHE_CAPACITY: &'static str = "CODERANK_QUERY_CACHE_CAPACITY";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            data_dir: env::parse_path(Self::ENV_DATA_DIR, defaults.data_dir),
            embedder_path: env::parse_optional_path(Self::ENV_EMBEDDER_PATH),
            cross_encoder_path: env::parse_optional_path(Self::ENV_CROSS_ENCODER_PATH),
            finetuned_cross_encoder_path: env::parse_optional_path(
                Self::ENV_FINETUNED_CROSS_ENCODER_PATH,
            ),
            query_cache_capacity: env::parse_from_env(
                Self::ENV_QUERY_CACHE_CAPACITY,
                defaults.query_cache_capacity,
            )?,
        })
    }

    /// Validates paths (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_dir.clone(),
            });
        }

        for path in [
            &self.embedder_path,
            &self.cross_encoder_path,
            &self.finetuned_cross_encoder_path,
        ]
        .into_iter()
        .flatten()
        {
            validate_model_dir(path)?;
        }

        Ok(())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Cross-encoder directory for the given fine-tuning switch.
    ///
    /// Asking for the fine-tuned model without `CODERANK_FINETUNED_CROSS_ENCODER_PATH` is an
    /// error rather than a silent fall back to the base model.
    pub fn cross_encoder_dir(&self, use_finetuned: bool) -> Result<Option<&Path>, ConfigError> {
        if !use_finetuned {
            return Ok(self.cross_encoder_path.as_deref());
        }
        match &self.finetuned_cross_encoder_path {
            Some(path) => Ok(Some(path)),
            None => Err(ConfigError::MissingFinetunedModel {
                name: Self::ENV_FINETUNED_CROSS_ENCODER_PATH,
            }),
        }
    }
}

fn validate_model_dir(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
