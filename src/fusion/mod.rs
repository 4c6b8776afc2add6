//! Candidate fusion.
//!
//! Per query variant: min-max normalize the vector and lexical scores over the whole corpus,
//! combine them as `alpha * vector + (1 - alpha) * lexical`, add the name boost where the query
//! names a chunk's symbol. Across variants: keep each chunk's best fused score. Finally order by
//! [`by_score_then_id`] and cut to the pool size.

mod expander;

#[cfg(test)]
mod tests;

pub use expander::{QueryExpander, QueryRequest, TemplateExpander};

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::chunk::ChunkId;
use crate::config::PipelineConfig;
use crate::lexical::tokenize;
use crate::scoring::{FusedCandidate, ScoredCandidate, by_score_then_id, sanitize_score};
use crate::store::ChunkStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Weight of the vector signal; the lexical signal gets `1 - alpha`.
    pub alpha: f32,
    pub pool_size: usize,
    /// Additive bonus for an exact symbol-name match, `None` when boosting is off.
    pub name_boost: Option<f32>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for FusionConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            alpha: config.fusion_alpha,
            pool_size: config.candidate_pool_size,
            name_boost: config
                .use_function_name_boosting
                .then_some(config.name_boost),
        }
    }
}

/// Raw scorer output for one query variant.
#[derive(Debug, Clone)]
pub struct VariantScores {
    pub query: String,
    pub vector: Vec<ScoredCandidate>,
    pub lexical: Vec<ScoredCandidate>,
}

/// Fuses every variant's scores into the ordered, truncated candidate pool.
///
/// Chunks missing from a scorer's output count as scoring that scorer's minimum. An empty store
/// yields an empty pool.
pub fn fuse(
    variants: &[VariantScores],
    store: &ChunkStore,
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    if store.is_empty() || variants.is_empty() {
        return Vec::new();
    }

    let mut best: Vec<Option<FusedCandidate>> = vec![None; store.len()];

    for (variant, scores) in variants.iter().enumerate() {
        for (position, candidate) in fuse_variant(variant, scores, store, config)
            .into_iter()
            .enumerate()
        {
            let slot = &mut best[position];
            let replace = match slot {
                Some(current) => candidate.fused_score > current.fused_score,
                None => true,
            };
            if replace {
                *slot = Some(candidate);
            }
        }
    }

    let mut pool: Vec<FusedCandidate> = best.into_iter().flatten().collect();
    pool.sort_by(by_score_then_id);
    pool.truncate(config.pool_size);
    for (i, candidate) in pool.iter_mut().enumerate() {
        candidate.fused_rank = i + 1;
    }

    debug!(
        variants = variants.len(),
        corpus = store.len(),
        pool = pool.len(),
        boosted = pool.iter().filter(|c| c.boost_applied).count(),
        "Fusion complete"
    );

    pool
}

/// One fused candidate per chunk, in corpus order.
fn fuse_variant(
    variant: usize,
    scores: &VariantScores,
    store: &ChunkStore,
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    let vector_raw = aligned(&scores.vector, store);
    let lexical_raw = aligned(&scores.lexical, store);
    let vector_norm = min_max_normalize(&vector_raw);
    let lexical_norm = min_max_normalize(&lexical_raw);

    let query_tokens: HashSet<String> = if config.name_boost.is_some() {
        tokenize(&scores.query).into_iter().collect()
    } else {
        HashSet::new()
    };

    store
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut fused = config.alpha * vector_norm[i] + (1.0 - config.alpha) * lexical_norm[i];

            let boost = match (config.name_boost, record.symbol()) {
                (Some(boost), Some(symbol))
                    if boost > 0.0 && query_tokens.contains(&symbol.to_lowercase()) =>
                {
                    Some(boost)
                }
                _ => None,
            };
            if let Some(boost) = boost {
                fused += boost;
            }

            FusedCandidate {
                id: record.id().clone(),
                vector_score: finite_or_zero(vector_raw[i]),
                lexical_score: finite_or_zero(lexical_raw[i]),
                fused_score: sanitize_score(fused),
                boost_applied: boost.is_some(),
                variant,
                fused_rank: 0,
            }
        })
        .collect()
}

/// Scores laid out in store order. Missing chunks get NaN and are normalized to the minimum.
fn aligned(scores: &[ScoredCandidate], store: &ChunkStore) -> Vec<f32> {
    let in_order = scores.len() == store.len()
        && scores
            .iter()
            .zip(store.ids())
            .all(|(s, id)| &s.id == id);
    if in_order {
        return scores.iter().map(|s| s.score).collect();
    }

    let by_id: HashMap<&ChunkId, f32> = scores.iter().map(|s| (&s.id, s.score)).collect();
    store
        .ids()
        .map(|id| by_id.get(id).copied().unwrap_or(f32::NAN))
        .collect()
}

#[inline]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

/// Min-max scaling to `[0, 1]`.
///
/// A constant signal carries no ranking information and maps to all zeros. Non-finite values
/// map to `0.0`.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; values.len()];
    }

    values
        .iter()
        .map(|&v| if v.is_finite() { (v - min) / range } else { 0.0 })
        .collect()
}
