//! Score-carrying records shared by the retrieval stages, and the float hygiene they rely on.
//!
//! Stage order: [`ScoredCandidate`] (one signal) → [`FusedCandidate`] (fusion) →
//! [`RankedResult`] (cross-encoder).

pub mod types;


pub use types::{FusedCandidate, RankedResult, ScoredCandidate};

use std::cmp::Ordering;

use tracing::warn;

/// Replaces NaN and infinities with `0.0`.
///
/// Every model output passes through here before it is compared or normalized.
#[inline]
pub fn sanitize_score(score: f32) -> f32 {
    if score.is_finite() {
        score
    } else {
        warn!(score = %score, "Non-finite model score replaced with 0.0");
        0.0
    }
}

/// Descending score, then ascending chunk id.
///
/// The total order every ranked list in the crate is sorted with.
#[inline]
pub fn by_score_then_id(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| a.id.cmp(&b.id))
}
