use serde::Serialize;

use crate::chunk::ChunkId;

/// One chunk's score from a single signal (vector or lexical).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub id: ChunkId,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn new(id: ChunkId, score: f32) -> Self {
        Self { id, score }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Candidate after hybrid fusion.
pub struct FusedCandidate {
    pub id: ChunkId,
    /// Raw cosine similarity.
    pub vector_score: f32,
    /// Raw BM25 score.
    pub lexical_score: f32,
    /// `alpha * norm(vector) + (1 - alpha) * norm(lexical)`, plus the name boost when applied.
    pub fused_score: f32,
    /// The query named this chunk's symbol.
    pub boost_applied: bool,
    /// Index of the query variant (0 = original phrasing) that produced the kept score.
    pub variant: usize,
    /// 1-based position in the fused pool.
    pub fused_rank: usize,
}

impl FusedCandidate {
    /// A candidate neither signal scored, placed at `fused_rank`.
    pub fn unscored(id: ChunkId, fused_rank: usize) -> Self {
        Self {
            id,
            vector_score: 0.0,
            lexical_score: 0.0,
            fused_score: 0.0,
            boost_applied: false,
            variant: 0,
            fused_rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Candidate after cross-encoder re-ranking.
pub struct RankedResult {
    pub candidate: FusedCandidate,
    pub rerank_score: f32,
    /// 1-based, dense, in final order.
    pub rank: usize,
}

impl RankedResult {
    pub fn id(&self) -> &ChunkId {
        &self.candidate.id
    }
}
