//! Cross-encoder re-ranking of the fused pool.
//!
//! Every candidate is scored independently against the query on a bounded pool of blocking
//! workers. The output is a permutation of the input: same ids, re-sorted by rerank score with
//! the fused rank as tie-break, ranks renumbered from 1.

pub mod aggregation;
pub mod error;


pub use aggregation::{
    FileScore, aggregate_by_file, blend_file_scores, files_from_summaries, rank_by_file_weight,
};
pub use error::{RerankError, RerankResult};

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::config::PipelineConfig;
use crate::embedding::{CrossEncoder, CrossEncoderError};
use crate::scoring::{FusedCandidate, RankedResult, sanitize_score};
use crate::store::ChunkStore;

#[derive(Clone)]
pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
    workers: usize,
    signature_only: bool,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("available", &self.encoder.is_available())
            .field("workers", &self.workers)
            .field("signature_only", &self.signature_only)
            .finish()
    }
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, workers: usize, signature_only: bool) -> Self {
        Self {
            encoder,
            workers: workers.max(1),
            signature_only,
        }
    }

    pub fn from_config(encoder: Arc<dyn CrossEncoder>, config: &PipelineConfig) -> Self {
        Self::new(encoder, config.rerank_workers, config.use_signature_only)
    }

    pub fn is_available(&self) -> bool {
        self.encoder.is_available()
    }

    pub fn signature_only(&self) -> bool {
        self.signature_only
    }

    /// Scores and re-orders `pool`.
    ///
    /// An empty pool is returned as-is without touching the model. Any candidate failing to score
    /// fails the whole call.
    #[instrument(skip_all, fields(pool = pool.len(), signature_only = self.signature_only))]
    pub async fn rerank(
        &self,
        query: &str,
        pool: Vec<FusedCandidate>,
        store: Arc<ChunkStore>,
    ) -> RerankResult<Vec<RankedResult>> {
        if pool.is_empty() {
            return Ok(Vec::new());
        }
        if !self.encoder.is_available() {
            return Err(RerankError::ModelUnavailable);
        }

        let texts = pool
            .iter()
            .map(|candidate| {
                store
                    .get(&candidate.id)
                    .map(|record| record.rerank_text(self.signature_only))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let query: Arc<str> = Arc::from(query);
        let mut tasks = JoinSet::new();

        for (index, text) in texts.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RerankError::TaskFailed(e.to_string()))?;
            let encoder = Arc::clone(&self.encoder);
            let query = Arc::clone(&query);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                (index, encoder.score(&query, &text))
            });
        }

        let mut scores = vec![0.0f32; pool.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| RerankError::TaskFailed(e.to_string()))?;
            let score = result.map_err(|source| match source {
                CrossEncoderError::NotAvailable { .. } => RerankError::ModelUnavailable,
                source => RerankError::Scoring {
                    id: pool[index].id.clone(),
                    source,
                },
            })?;
            scores[index] = sanitize_score(score);
        }

        let mut ranked: Vec<RankedResult> = pool
            .into_iter()
            .zip(scores)
            .map(|(candidate, rerank_score)| RankedResult {
                candidate,
                rerank_score,
                rank: 0,
            })
            .collect();
        sort_and_rank(&mut ranked);

        debug!(
            results = ranked.len(),
            top = ranked.first().map(|r| r.id().as_str()),
            "Re-ranking complete"
        );

        Ok(ranked)
    }
}

/// Descending rerank score, ties by ascending fused rank; then assigns dense 1-based ranks.
pub fn sort_and_rank(results: &mut [RankedResult]) {
    results.sort_by(|a, b| {
        b.rerank_score
            .total_cmp(&a.rerank_score)
            .then_with(|| a.candidate.fused_rank.cmp(&b.candidate.fused_rank))
    });
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}
