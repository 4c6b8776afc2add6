//! Query embedding cache.
//!
//! [`CachedEmbedder`] wraps any [`Embedder`] and memoises single-text embeddings under a
//! BLAKE3 key of `(model id, text)`.

use std::sync::Arc;

use moka::sync::Cache;
use tracing::trace;

use super::{Embedder, EmbeddingError};
use crate::constants::DEFAULT_QUERY_CACHE_CAPACITY;
use crate::hashing::hash_query;

pub struct CachedEmbedder<E> {
    inner: E,
    entries: Cache<[u8; 32], Arc<Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    #[inline]
    pub fn new(inner: E) -> Self {
        Self::with_capacity(inner, DEFAULT_QUERY_CACHE_CAPACITY)
    }

    /// Creates a cache with a max entry capacity (LRU-ish eviction).
    #[inline]
    pub fn with_capacity(inner: E, capacity: u64) -> Self {
        Self {
            inner,
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Returns the number of cached entries.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn embedding_dim(&self) -> usize {
        self.inner.embedding_dim()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = hash_query(self.inner.model_id(), text);
        if let Some(hit) = self.entries.get(&key) {
            trace!(text_len = text.len(), "Query embedding cache hit");
            return Ok(hit.as_ref().clone());
        }

        let embedding = self.inner.embed(text)?;
        self.entries.insert(key, Arc::new(embedding.clone()));
        Ok(embedding)
    }

    /// Bulk index builds bypass the cache: chunk texts are embedded exactly once.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.inner.embed_batch(texts)
    }
}
