//! BERT bi-encoder embedder.
//!
//! Use [`EncoderConfig::stub`] for tests and demos without model files. The stub is a bag of
//! hashed tokens: texts sharing words get similar vectors, so stub-mode retrieval still behaves
//! like retrieval.

/// Encoder configuration.
pub mod config;


pub use config::EncoderConfig;

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::bert::BertEncoder;
use super::device::{device_label, select_device};
use super::error::EmbeddingError;
use super::tokenizer::{has_model_files, load_tokenizer};
use super::{Embedder, l2_normalize};
use crate::hashing::hash_to_u64;
use crate::lexical::tokenize;

enum EncoderBackend {
    Model {
        model: BertEncoder,
        tokenizer: Tokenizer,
        device: Device,
    },
    Stub,
}

/// Embedding generator for chunk and query text (supports stub mode).
pub struct BertEmbedder {
    backend: EncoderBackend,
    config: EncoderConfig,
    model_id: String,
    embedding_dim: usize,
}

impl std::fmt::Debug for BertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEmbedder")
            .field(
                "backend",
                &match &self.backend {
                    EncoderBackend::Model { device, .. } => {
                        format!("Model({})", device_label(device))
                    }
                    EncoderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("model_id", &self.model_id)
            .field("embedding_dim", &self.embedding_dim)
            .field("max_seq_len", &self.config.max_seq_len)
            .finish()
    }
}

impl BertEmbedder {
    /// Loads the embedder from a config (stub mode is supported).
    pub fn load(config: EncoderConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;
        let model_id = config.model_id();

        if config.testing_stub {
            warn!(
                embedding_dim = config.embedding_dim,
                "Embedder running in STUB mode"
            );
            return Ok(Self {
                backend: EncoderBackend::Stub,
                embedding_dim: config.embedding_dim,
                model_id,
                config,
            });
        }

        if !has_model_files(&config.model_dir) {
            return Err(EmbeddingError::ModelLoadFailed {
                reason: format!(
                    "expected config.json, model.safetensors and tokenizer.json in {}",
                    config.model_dir.display()
                ),
            });
        }

        let device = select_device()?;
        debug!(device = device_label(&device), "Selected compute device for embedder");

        let model = BertEncoder::load(&config.model_dir, &device).map_err(|e| {
            EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to load BERT encoder: {}", e),
            }
        })?;
        let tokenizer = load_tokenizer(&config.model_dir, config.max_seq_len).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        let embedding_dim = model.hidden_size();
        info!(
            model_dir = %config.model_dir.display(),
            model_id = %model_id,
            embedding_dim,
            max_seq_len = config.max_seq_len,
            "Embedding model loaded"
        );

        Ok(Self {
            backend: EncoderBackend::Model {
                model,
                tokenizer,
                device,
            },
            config,
            model_id,
            embedding_dim,
        })
    }

    /// Deterministic stub with the given output dimension.
    pub fn stub(embedding_dim: usize) -> Result<Self, EmbeddingError> {
        Self::load(EncoderConfig::stub().with_embedding_dim(embedding_dim))
    }

    fn embed_with_model(
        &self,
        text: &str,
        model: &BertEncoder,
        tokenizer: &Tokenizer,
        device: &Device,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let encoding =
            tokenizer
                .encode(text, true)
                .map_err(|e| EmbeddingError::TokenizationFailed {
                    reason: e.to_string(),
                })?;

        if encoding.get_ids().is_empty() {
            return Ok(vec![0.0; self.embedding_dim]);
        }

        debug!(
            text_len = text.len(),
            token_count = encoding.get_ids().len(),
            "Generating embedding (transformer forward pass)"
        );

        let input_ids = Tensor::new(encoding.get_ids(), device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(encoding.get_type_ids(), device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), device)?.unsqueeze(0)?;

        let mut embedding = model
            .forward_mean_pooled(&input_ids, &type_ids, &attention_mask)
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("Transformer forward pass failed: {}", e),
            })?;

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn embed_stub(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.embedding_dim];

        for token in tokenize(text) {
            let mut state = hash_to_u64(token.as_bytes());
            for slot in embedding.iter_mut() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                *slot += ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            }
        }

        l2_normalize(&mut embedding);
        embedding
    }

    /// Returns `true` if running in stub mode.
    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EncoderBackend::Stub)
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match &self.backend {
            EncoderBackend::Model {
                model,
                tokenizer,
                device,
            } => self.embed_with_model(text, model, tokenizer, device),
            EncoderBackend::Stub => Ok(self.embed_stub(text)),
        }
    }
}
