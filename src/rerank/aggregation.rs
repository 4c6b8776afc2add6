//! File-level scores from chunk-level results.

use std::collections::HashMap;

use serde::Serialize;

use crate::chunk::ChunkId;
use crate::chunk::KindTag;
use crate::config::FileAggregation;
use crate::scoring::RankedResult;
use crate::store::ChunkStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileScore {
    pub path: String,
    pub score: f32,
    /// Contributing chunks in result order.
    pub chunks: Vec<ChunkId>,
}

/// Groups `results` by source file and folds each group's rerank scores with `strategy`.
///
/// Results whose chunk is missing from `store` are skipped. Output is ordered by descending
/// score, then path.
pub fn aggregate_by_file(
    results: &[RankedResult],
    store: &ChunkStore,
    strategy: FileAggregation,
) -> Vec<FileScore> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Vec<f32>, Vec<ChunkId>)> = HashMap::new();

    for result in results {
        let Some(record) = store.lookup(result.id()) else {
            continue;
        };
        let path = record.location().normalized_path();
        let group = groups.entry(path.clone()).or_insert_with(|| {
            order.push(path);
            (Vec::new(), Vec::new())
        });
        group.0.push(result.rerank_score);
        group.1.push(result.id().clone());
    }

    let mut files: Vec<FileScore> = order
        .into_iter()
        .filter_map(|path| {
            let (scores, chunks) = groups.remove(&path)?;
            Some(FileScore {
                score: fold(&scores, strategy),
                path,
                chunks,
            })
        })
        .collect();

    files.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    files
}

fn fold(scores: &[f32], strategy: FileAggregation) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    let n = scores.len() as f32;
    let sum: f32 = scores.iter().sum();
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    match strategy {
        FileAggregation::Max => max,
        FileAggregation::Mean => sum / n,
        FileAggregation::Weighted => sum / n + 0.5 * max,
        FileAggregation::Count => sum / n.sqrt(),
    }
}

/// File-aware ranking: each result's score becomes
/// `weight * file_score + (1 - weight) * rerank_score`, with file scores aggregated from
/// `results` themselves. Returns the file scores used.
pub fn rank_by_file_weight(
    results: &mut Vec<RankedResult>,
    store: &ChunkStore,
    strategy: FileAggregation,
    weight: f32,
) -> Vec<FileScore> {
    let files = aggregate_by_file(results, store, strategy);
    let by_path: HashMap<&str, f32> = files.iter().map(|f| (f.path.as_str(), f.score)).collect();
    blend_file_scores(results, store, &by_path, weight);
    files
}

/// Re-sorts `results` by `weight * file + (1 - weight) * rerank` and renumbers ranks from 1.
///
/// Results from files missing in `file_scores` get a file score of `0.0`. The sort is stable,
/// so equal blends keep their incoming order.
pub fn blend_file_scores(
    results: &mut Vec<RankedResult>,
    store: &ChunkStore,
    file_scores: &HashMap<&str, f32>,
    weight: f32,
) {
    let mut keyed: Vec<(f32, RankedResult)> = std::mem::take(results)
        .into_iter()
        .map(|result| {
            let file_score = store
                .lookup(result.id())
                .and_then(|record| {
                    file_scores
                        .get(record.location().normalized_path().as_str())
                        .copied()
                })
                .unwrap_or(0.0);
            (weight * file_score + (1.0 - weight) * result.rerank_score, result)
        })
        .collect();

    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    results.extend(keyed.into_iter().map(|(_, result)| result));
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}

/// Files ranked by their synthesized summary chunk's rerank score, in result order.
///
/// Only the first summary per path counts. Empty when no summary chunk was retrieved.
pub fn files_from_summaries(results: &[RankedResult], store: &ChunkStore) -> Vec<FileScore> {
    let mut files: Vec<FileScore> = Vec::new();
    for result in results {
        let Some(record) = store.lookup(result.id()) else {
            continue;
        };
        if record.kind().tag() != KindTag::FileSummary {
            continue;
        }
        let path = record.location().normalized_path();
        if files.iter().any(|f| f.path == path) {
            continue;
        }
        files.push(FileScore {
            path,
            score: result.rerank_score,
            chunks: vec![result.id().clone()],
        });
    }
    files
}
