//! Per-question records and the aggregate metrics computed from them.

use std::collections::BTreeMap;

use serde::Serialize;

use super::dataset::GroundTruth;
use crate::chunk::ChunkId;
use crate::constants::{HALLUCINATION_RECALL_K, RANK_CUTOFFS};
use crate::selector::{Selection, SelectionOutcome};

/// Where the ground-truth chunk sat after each stage. `None` means it was not in the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageTrace {
    pub fused_rank: Option<usize>,
    pub final_rank: Option<usize>,
    /// 1-based rank of the first result from the ground-truth chunk's file.
    pub file_rank: Option<usize>,
    pub boost_applied: bool,
}

/// One evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    /// Position in the dataset.
    pub index: usize,
    pub query: String,
    pub truth: GroundTruth,
    /// Re-ranked chunk ids, rank 1 first.
    pub ranked: Vec<ChunkId>,
    pub trace: StageTrace,
    pub selection: SelectionOutcome,
    /// Set when the pipeline failed before a selection could be made.
    pub pipeline_error: Option<String>,
    pub latency_ms: u64,
}

impl EvaluationRecord {
    /// A question the pipeline could not answer because retrieval failed.
    pub fn failed(
        index: usize,
        query: impl Into<String>,
        truth: GroundTruth,
        error: impl ToString,
        latency_ms: u64,
    ) -> Self {
        let error = error.to_string();
        Self {
            index,
            query: query.into(),
            truth,
            ranked: Vec::new(),
            trace: StageTrace::default(),
            selection: SelectionOutcome::failed(&error),
            pipeline_error: Some(error),
            latency_ms,
        }
    }

    /// 1-based rank of the ground-truth chunk in the re-ranked list.
    pub fn rank_of_truth(&self) -> Option<usize> {
        let truth = self.truth.chunk_id()?;
        self.ranked
            .iter()
            .position(|id| id == truth)
            .map(|i| i + 1)
    }

    /// `true` when the ground-truth chunk is within the top `k`. Always `false` for
    /// unanswerable questions.
    pub fn hit_at(&self, k: usize) -> bool {
        self.rank_of_truth().is_some_and(|rank| rank <= k)
    }

    pub fn reciprocal_rank(&self) -> f64 {
        self.rank_of_truth().map_or(0.0, |rank| 1.0 / rank as f64)
    }

    /// The selector asserted an answer it should not have: any chunk for an unanswerable
    /// question, or a chunk ranked beyond [`HALLUCINATION_RECALL_K`] for an answerable one.
    pub fn is_hallucination(&self) -> bool {
        match (&self.truth, &self.selection.selection) {
            (_, Selection::NoMatch) => false,
            (GroundTruth::NoAnswer, Selection::Chunk { .. }) => true,
            (GroundTruth::Chunk(truth), Selection::Chunk { index, id }) => {
                id != truth && index + 1 > HALLUCINATION_RECALL_K
            }
        }
    }

    /// An unanswerable question answered with a clean "no match".
    pub fn is_correct_refusal(&self) -> bool {
        self.truth.is_no_answer() && self.selection.is_no_match() && !self.selection.is_failure()
    }

    /// The selector picked the ground-truth chunk.
    pub fn is_correct_selection(&self) -> bool {
        self.truth
            .chunk_id()
            .is_some_and(|truth| self.selection.selected_id() == Some(truth))
    }

    pub fn is_pipeline_failure(&self) -> bool {
        self.pipeline_error.is_some()
    }

    /// The pipeline succeeded but the selector reported an error.
    pub fn is_selector_failure(&self) -> bool {
        !self.is_pipeline_failure() && self.selection.is_failure()
    }
}

/// Aggregates over one run.
///
/// Retrieval metrics (`rank_at`, `mrr`, `file_rank_at`) and `selection_accuracy` are taken
/// over answerable questions whose pipeline completed. `hallucination_rate` and
/// `correct_refusal_rate` are taken over completed unanswerable questions. Failures are
/// counted separately and never enter a denominator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total: usize,
    pub answerable: usize,
    pub unanswerable: usize,
    pub rank_at: BTreeMap<usize, f64>,
    pub file_rank_at: BTreeMap<usize, f64>,
    pub mrr: f64,
    pub selection_accuracy: f64,
    pub hallucination_rate: f64,
    pub correct_refusal_rate: f64,
    /// Hallucinations of either kind, including over-deep picks on answerable questions.
    pub hallucinations: usize,
    pub pipeline_failures: usize,
    pub selector_failures: usize,
    pub mean_latency_ms: f64,
}

impl Metrics {
    pub fn compute(records: &[EvaluationRecord]) -> Self {
        let completed: Vec<&EvaluationRecord> =
            records.iter().filter(|r| !r.is_pipeline_failure()).collect();
        let answerable: Vec<&EvaluationRecord> = completed
            .iter()
            .copied()
            .filter(|r| !r.truth.is_no_answer())
            .collect();
        let unanswerable: Vec<&EvaluationRecord> = completed
            .iter()
            .copied()
            .filter(|r| r.truth.is_no_answer())
            .collect();

        let fraction = |hits: usize, of: usize| {
            if of == 0 { 0.0 } else { hits as f64 / of as f64 }
        };

        let rank_at = RANK_CUTOFFS
            .iter()
            .map(|&k| {
                let hits = answerable.iter().filter(|r| r.hit_at(k)).count();
                (k, fraction(hits, answerable.len()))
            })
            .collect();
        let file_rank_at = RANK_CUTOFFS
            .iter()
            .map(|&k| {
                let hits = answerable
                    .iter()
                    .filter(|r| r.trace.file_rank.is_some_and(|rank| rank <= k))
                    .count();
                (k, fraction(hits, answerable.len()))
            })
            .collect();

        let mrr = if answerable.is_empty() {
            0.0
        } else {
            answerable.iter().map(|r| r.reciprocal_rank()).sum::<f64>() / answerable.len() as f64
        };
        let mean_latency_ms = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.latency_ms as f64).sum::<f64>() / records.len() as f64
        };

        Self {
            total: records.len(),
            answerable: answerable.len(),
            unanswerable: unanswerable.len(),
            rank_at,
            file_rank_at,
            mrr,
            selection_accuracy: fraction(
                answerable.iter().filter(|r| r.is_correct_selection()).count(),
                answerable.len(),
            ),
            hallucination_rate: fraction(
                unanswerable.iter().filter(|r| r.is_hallucination()).count(),
                unanswerable.len(),
            ),
            correct_refusal_rate: fraction(
                unanswerable.iter().filter(|r| r.is_correct_refusal()).count(),
                unanswerable.len(),
            ),
            hallucinations: completed.iter().filter(|r| r.is_hallucination()).count(),
            pipeline_failures: records.len() - completed.len(),
            selector_failures: records.iter().filter(|r| r.is_selector_failure()).count(),
            mean_latency_ms,
        }
    }

    /// `Rank@k`, if `k` is one of the reported cut-offs.
    pub fn rank_at_k(&self, k: usize) -> Option<f64> {
        self.rank_at.get(&k).copied()
    }
}
