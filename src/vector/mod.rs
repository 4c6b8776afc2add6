//! Vector scoring: cosine similarity between a query embedding and every stored chunk
//! embedding.


use half::f16;
use thiserror::Error;
use tracing::debug;

use crate::scoring::{ScoredCandidate, sanitize_score};
use crate::store::ChunkStore;

#[derive(Debug, Error)]
pub enum VectorError {
    /// Query and index were embedded by models of different width. Never truncated or padded.
    #[error("query embedding has {actual} dimensions, index stores {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Cosine similarity of `query` against every chunk in `store`, in corpus order.
///
/// Scores lie in `[-1, 1]`. A zero-norm vector on either side scores `0.0`.
pub fn score(query: &[f32], store: &ChunkStore) -> Result<Vec<ScoredCandidate>, VectorError> {
    if store.is_empty() {
        return Ok(Vec::new());
    }
    if query.len() != store.embedding_dim() {
        return Err(VectorError::DimensionMismatch {
            expected: store.embedding_dim(),
            actual: query.len(),
        });
    }

    let query_norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();

    let scores: Vec<ScoredCandidate> = store
        .iter()
        .map(|record| {
            let similarity = cosine_with_norm(record.embedding(), query, query_norm);
            ScoredCandidate::new(record.id().clone(), sanitize_score(similarity))
        })
        .collect();

    debug!(chunks = scores.len(), dim = query.len(), "Vector scoring complete");
    Ok(scores)
}

/// Cosine similarity between a stored f16 embedding and an f32 query.
///
/// Different lengths, empty input and zero vectors all yield `0.0`.
#[inline]
pub fn cosine_similarity_f16_f32(a: &[f16], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    cosine_with_norm(a, b, norm_b)
}

#[inline]
fn cosine_with_norm(a: &[f16], b: &[f32], norm_b: f32) -> f32 {
    let mut dot_product = 0.0f32;
    let mut norm_a_sq = 0.0f32;

    for (av_f16, &bv) in a.iter().zip(b.iter()) {
        let av = av_f16.to_f32();
        dot_product += av * bv;
        norm_a_sq += av * av;
    }

    let norm_a = norm_a_sq.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
