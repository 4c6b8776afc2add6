//! Scriptable model capabilities for tests.

use std::collections::HashMap;

use super::{CrossEncoder, CrossEncoderError, Embedder, EmbeddingError};

/// Returns a preset vector per exact text, and `default` for everything else.
#[derive(Debug, Clone)]
pub struct FixedEmbedder {
    dim: usize,
    model_id: String,
    vectors: HashMap<String, Vec<f32>>,
    default: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_id: format!("fixed-{dim}"),
            vectors: HashMap::new(),
            default: vec![0.0; dim],
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    pub fn with_default(mut self, vector: Vec<f32>) -> Self {
        self.default = vector;
        self
    }
}

impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Cross-encoder backed by a closure.
pub struct FnCrossEncoder<F> {
    score: F,
}

impl<F> FnCrossEncoder<F>
where
    F: Fn(&str, &str) -> f32 + Send + Sync,
{
    pub fn new(score: F) -> Self {
        Self { score }
    }
}

impl<F> CrossEncoder for FnCrossEncoder<F>
where
    F: Fn(&str, &str) -> f32 + Send + Sync,
{
    fn score(&self, query: &str, candidate: &str) -> Result<f32, CrossEncoderError> {
        Ok((self.score)(query, candidate))
    }
}

/// A cross-encoder whose model never loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCrossEncoder;

impl CrossEncoder for UnavailableCrossEncoder {
    fn score(&self, _query: &str, _candidate: &str) -> Result<f32, CrossEncoderError> {
        Err(CrossEncoderError::NotAvailable {
            reason: "model not loaded".to_string(),
        })
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Available, but every call fails at inference time.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingCrossEncoder;

impl CrossEncoder for FailingCrossEncoder {
    fn score(&self, _query: &str, _candidate: &str) -> Result<f32, CrossEncoderError> {
        Err(CrossEncoderError::InferenceFailed {
            reason: "scripted failure".to_string(),
        })
    }
}
