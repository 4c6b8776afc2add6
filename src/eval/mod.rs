//! Evaluator: runs the pipeline over a labelled question set and scores it.
//!
//! Questions run concurrently, bounded by `eval_workers`. A per-question failure becomes a
//! failed [`EvaluationRecord`] and the run continues; a fatal (configuration) error aborts the
//! whole run. Records are re-sorted into dataset order before metrics are computed, so the
//! report does not depend on completion order.

pub mod dataset;
pub mod error;
pub mod metrics;
pub mod report;

#[cfg(test)]
mod tests;

pub use dataset::{EvaluationCase, GroundTruth, load_dataset, parse_dataset};
pub use error::{EvalError, EvalResult};
pub use metrics::{EvaluationRecord, Metrics, StageTrace};
pub use report::EvaluationReport;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::pipeline::{Answer, PipelineError, RetrievalPipeline};

pub struct Evaluator {
    pipeline: Arc<RetrievalPipeline>,
    workers: usize,
}

impl Evaluator {
    pub fn new(pipeline: Arc<RetrievalPipeline>) -> Self {
        let workers = pipeline.config().eval_workers.max(1);
        Self { pipeline, workers }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Evaluates every case. Cancelling `cancel` stops the run with [`EvalError::Cancelled`].
    #[instrument(skip_all, fields(questions = cases.len(), workers = self.workers))]
    pub async fn run(
        &self,
        cases: &[EvaluationCase],
        cancel: &CancellationToken,
    ) -> EvalResult<EvaluationReport> {
        self.pipeline.preflight().await.map_err(EvalError::Preflight)?;

        let started_at = Utc::now();
        let records: Vec<EvaluationRecord> = stream::iter(cases.iter().enumerate())
            .map(|(index, case)| self.evaluate(index, case, cancel))
            .buffer_unordered(self.workers)
            .try_collect()
            .await?;

        let report = EvaluationReport::new(
            started_at,
            self.pipeline.selector_description(),
            self.pipeline.config().clone(),
            records,
        );

        let m = &report.metrics;
        info!(
            total = m.total,
            answerable = m.answerable,
            unanswerable = m.unanswerable,
            rank_at_1 = m.rank_at_k(1).unwrap_or_default(),
            rank_at_5 = m.rank_at_k(5).unwrap_or_default(),
            mrr = m.mrr,
            hallucination_rate = m.hallucination_rate,
            pipeline_failures = m.pipeline_failures,
            selector_failures = m.selector_failures,
            "Evaluation complete"
        );
        Ok(report)
    }

    async fn evaluate(
        &self,
        index: usize,
        case: &EvaluationCase,
        cancel: &CancellationToken,
    ) -> EvalResult<EvaluationRecord> {
        let started = Instant::now();
        let query_cancel = cancel.child_token();
        let outcome = self.pipeline.answer(&case.query, &query_cancel).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(answer) => {
                let record = self.record(index, case, answer, latency_ms);
                debug!(
                    index,
                    rank = record.rank_of_truth(),
                    selected = record.selection.selected_id().map(|id| id.as_str()),
                    latency_ms,
                    "Question evaluated"
                );
                Ok(record)
            }
            Err(PipelineError::Cancelled) if cancel.is_cancelled() => Err(EvalError::Cancelled),
            Err(e) if e.is_fatal() => Err(EvalError::Fatal {
                index,
                source: e,
            }),
            Err(e) => {
                warn!(index, error = %e, "Question failed; continuing");
                Ok(EvaluationRecord::failed(
                    index,
                    case.query.clone(),
                    case.truth.clone(),
                    e,
                    latency_ms,
                ))
            }
        }
    }

    fn record(
        &self,
        index: usize,
        case: &EvaluationCase,
        answer: Answer,
        latency_ms: u64,
    ) -> EvaluationRecord {
        let Answer {
            retrieval,
            selection,
            index: search_index,
        } = answer;

        let mut trace = StageTrace::default();
        if let Some(truth) = case.truth.chunk_id() {
            if let Some(fused) = retrieval.fused.iter().find(|c| &c.id == truth) {
                trace.fused_rank = Some(fused.fused_rank);
                trace.boost_applied = fused.boost_applied;
            }
            trace.final_rank = retrieval
                .results
                .iter()
                .find(|r| r.id() == truth)
                .map(|r| r.rank);

            if let Some(path) = search_index
                .store()
                .lookup(truth)
                .map(|record| record.location().normalized_path())
            {
                trace.file_rank = retrieval
                    .results
                    .iter()
                    .find(|r| {
                        search_index
                            .store()
                            .lookup(r.id())
                            .is_some_and(|c| c.location().normalized_path() == path)
                    })
                    .map(|r| r.rank);
            }
        }

        EvaluationRecord {
            index,
            query: case.query.clone(),
            truth: case.truth.clone(),
            ranked: retrieval.results.iter().map(|r| r.id().clone()).collect(),
            trace,
            selection,
            pipeline_error: None,
            latency_ms,
        }
    }
}
