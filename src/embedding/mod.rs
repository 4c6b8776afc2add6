//! Embedding + model utilities.
//!
//! - [`Embedder`] turns text into a fixed-length vector ([`encoder`] is the BERT backend).
//! - [`CrossEncoder`] scores a `(query, candidate)` pair ([`cross_encoder`] is the BERT backend).
//! - [`cache`] memoises query embeddings.
//!
//! Both capabilities are synchronous and CPU/GPU bound. Async callers run them through
//! `tokio::task::spawn_blocking`.

/// BERT model wrappers shared by the encoder and the cross-encoder.
pub mod bert;
/// Query embedding cache.
pub mod cache;
/// Cross-encoder scoring backend.
pub mod cross_encoder;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
/// Bi-encoder embedding backend.
pub mod encoder;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
/// Tokenizer loading helpers.
pub mod tokenizer;

pub use cache::CachedEmbedder;
pub use cross_encoder::{BertCrossEncoder, CrossEncoderConfig, CrossEncoderError};
pub use encoder::{BertEmbedder, EncoderConfig};
pub use error::EmbeddingError;

/// Text to dense vector.
///
/// Implementations must be deterministic: the same text always yields the same vector, and
/// every vector has exactly [`embedding_dim`](Embedder::embedding_dim) components.
pub trait Embedder: Send + Sync {
    /// Stable identifier persisted with an index. Loading an index built by a different
    /// model id is a configuration error.
    fn model_id(&self) -> &str;

    fn embedding_dim(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// `(query, candidate)` to relevance score. Higher is more relevant; the scale is model
/// specific and only the order matters.
pub trait CrossEncoder: Send + Sync {
    fn score(&self, query: &str, candidate: &str) -> Result<f32, CrossEncoderError>;

    /// `false` when the configured model could not be loaded. Callers fail fast instead of
    /// scoring.
    fn is_available(&self) -> bool {
        true
    }
}

impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn embedding_dim(&self) -> usize {
        (**self).embedding_dim()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
