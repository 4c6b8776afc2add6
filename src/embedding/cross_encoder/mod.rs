//! BERT cross-encoder.
//!
//! Scores a `(query, candidate)` pair jointly with a single-logit classification head. Without a
//! model directory it runs a token-overlap stub; a configured model that fails to load turns
//! into an *unavailable* encoder whose every call errors.

pub mod config;
pub mod error;


pub use config::{CrossEncoderConfig, REQUIRED_MODEL_FILES};
pub use error::CrossEncoderError;

use std::collections::HashSet;

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::embedding::CrossEncoder;
use crate::embedding::bert::BertClassifier;
use crate::embedding::device::{device_label, select_device};
use crate::embedding::tokenizer::load_tokenizer;

enum Backend {
    Model {
        model: BertClassifier,
        tokenizer: Tokenizer,
        device: Device,
    },
    Stub,
    Unavailable {
        reason: String,
    },
}

pub struct BertCrossEncoder {
    backend: Backend,
    config: CrossEncoderConfig,
}

impl std::fmt::Debug for BertCrossEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Model { device, .. } => format!("Model({})", device_label(device)),
            Backend::Stub => "Stub".to_string(),
            Backend::Unavailable { reason } => format!("Unavailable({reason})"),
        };
        f.debug_struct("BertCrossEncoder")
            .field("backend", &backend)
            .field("config", &self.config)
            .finish()
    }
}

impl BertCrossEncoder {
    pub fn load(config: CrossEncoderConfig) -> Result<Self, CrossEncoderError> {
        config.validate()?;

        let Some(ref model_path) = config.model_path else {
            info!("No cross-encoder model path configured, operating in stub mode");
            return Ok(Self {
                backend: Backend::Stub,
                config,
            });
        };

        if let Some(missing) = config::first_missing_file(model_path) {
            return Err(CrossEncoderError::ModelLoadFailed {
                reason: format!("missing {missing} in {}", model_path.display()),
            });
        }

        let device = select_device()?;
        debug!(
            device = device_label(&device),
            "Selected compute device for cross-encoder"
        );

        info!(model_path = %model_path.display(), "Loading cross-encoder model");

        let model = BertClassifier::load(model_path, &device).map_err(|e| {
            CrossEncoderError::ModelLoadFailed {
                reason: format!("BERT weights: {e}"),
            }
        })?;

        let tokenizer = load_tokenizer(model_path, config.max_seq_len).map_err(|e| {
            CrossEncoderError::ModelLoadFailed {
                reason: format!("tokenizer: {e}"),
            }
        })?;

        info!("Cross-encoder model loaded successfully");

        Ok(Self {
            backend: Backend::Model {
                model,
                tokenizer,
                device,
            },
            config,
        })
    }

    /// Like [`load`](Self::load), but a model that fails to load yields an unavailable
    /// encoder whose every call fails with [`CrossEncoderError::NotAvailable`].
    pub fn load_or_unavailable(config: CrossEncoderConfig) -> Self {
        match Self::load(config.clone()) {
            Ok(encoder) => encoder,
            Err(e) => {
                warn!(error = %e, "Cross-encoder unavailable");
                Self {
                    backend: Backend::Unavailable {
                        reason: e.to_string(),
                    },
                    config,
                }
            }
        }
    }

    pub fn stub() -> Self {
        Self {
            backend: Backend::Stub,
            config: CrossEncoderConfig::stub(),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        matches!(self.backend, Backend::Model { .. })
    }

    pub fn config(&self) -> &CrossEncoderConfig {
        &self.config
    }

    fn score_with_model(
        query: &str,
        candidate: &str,
        model: &BertClassifier,
        tokenizer: &Tokenizer,
        device: &Device,
    ) -> Result<f32, CrossEncoderError> {
        let tokens = tokenizer.encode((query, candidate), true).map_err(|e| {
            CrossEncoderError::TokenizationFailed {
                reason: e.to_string(),
            }
        })?;

        let token_ids = Tensor::new(tokens.get_ids(), device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(tokens.get_type_ids(), device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(tokens.get_attention_mask(), device)?.unsqueeze(0)?;

        let logits = model
            .forward(&token_ids, &type_ids, Some(&attention_mask))
            .map_err(|e| CrossEncoderError::InferenceFailed {
                reason: e.to_string(),
            })?;

        logits
            .flatten_all()?
            .to_vec1::<f32>()?
            .first()
            .copied()
            .ok_or_else(|| CrossEncoderError::InferenceFailed {
                reason: "classifier returned no logits".to_string(),
            })
    }
}

impl CrossEncoder for BertCrossEncoder {
    fn score(&self, query: &str, candidate: &str) -> Result<f32, CrossEncoderError> {
        match &self.backend {
            Backend::Model {
                model,
                tokenizer,
                device,
            } => Self::score_with_model(query, candidate, model, tokenizer, device),
            Backend::Stub => {
                let score = placeholder_score(query, candidate);
                debug!(score, "Computed score (stub)");
                Ok(score)
            }
            Backend::Unavailable { reason } => Err(CrossEncoderError::NotAvailable {
                reason: reason.clone(),
            }),
        }
    }

    fn is_available(&self) -> bool {
        !matches!(self.backend, Backend::Unavailable { .. })
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "can", "to", "of", "in", "for", "on",
    "with", "at", "by", "from", "as", "into", "then", "here", "there", "when", "where", "why",
    "how", "all", "each", "some", "no", "not", "only", "so", "than", "and", "but", "if", "or",
    "what", "which", "who", "this", "that", "these", "those", "it", "its", "i", "me", "my",
];

/// Recall/Jaccard blend of content words, squashed to `(0, 1)`.
fn placeholder_score(query: &str, candidate: &str) -> f32 {
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

    let query_lower = query.to_lowercase();
    let query_words: HashSet<&str> = query_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !stop_words.contains(w))
        .collect();

    let candidate_lower = candidate.to_lowercase();
    let candidate_words: HashSet<&str> = candidate_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !stop_words.contains(w))
        .collect();

    if query_words.is_empty() {
        return 0.0;
    }

    let matches = query_words.intersection(&candidate_words).count();
    let recall = matches as f32 / query_words.len() as f32;

    let union = query_words.union(&candidate_words).count();
    let jaccard = matches as f32 / union.max(1) as f32;

    let base_score = 0.6 * recall + 0.4 * jaccard;
    let normalized = 1.0 / (1.0 + (-8.0 * (base_score - 0.5)).exp());

    normalized.clamp(0.0, 1.0)
}
