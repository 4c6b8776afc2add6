//! Cross-cutting, shared constants.
//!
//! Retrieval defaults live here so the config layer, the binary and the tests agree on them.

/// Hidden size of the BERT-family code encoders used for chunk embeddings.
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

/// Candidates handed from fusion to the cross-encoder.
pub const DEFAULT_CANDIDATE_POOL_SIZE: usize = 40;

/// Weight of the vector signal in `alpha * vector + (1 - alpha) * lexical`.
pub const DEFAULT_FUSION_ALPHA: f32 = 0.5;

/// Additive bonus for a chunk whose symbol name appears verbatim in the query.
pub const DEFAULT_NAME_BOOST: f32 = 1.0;

/// Share of the aggregated file score when file-aware ranking blends it with a chunk's own score.
pub const DEFAULT_FILE_VS_FUNCTION_WEIGHT: f32 = 0.7;

/// Files kept by the first stage of two-stage retrieval.
pub const DEFAULT_FILE_RETRIEVAL_TOP_K: usize = 3;

/// File and chunk scores weigh equally when two-stage retrieval orders its second stage.
pub const TWO_STAGE_FILE_WEIGHT: f32 = 0.5;

/// Candidates shown to the language model in one batch prompt (option letters B onwards).
pub const DEFAULT_BATCH_RANKING_SIZE: usize = 5;

/// Option letters run from `B` to `Z`; `A` is reserved for the no-match answer.
pub const MAX_BATCH_RANKING_SIZE: usize = 25;

pub const DEFAULT_INDIVIDUAL_TOP_N: usize = 10;

pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_LLM_MODEL: &str = "deepseek-coder:6.7b";

pub const DEFAULT_EVAL_WORKERS: usize = 4;

pub const DEFAULT_BM25_K1: f32 = 1.5;
pub const DEFAULT_BM25_B: f32 = 0.75;

/// Fraction of the mean IDF assigned to terms whose raw IDF would be negative.
pub const BM25_IDF_EPSILON: f32 = 0.25;

/// Cut-offs reported by the evaluator as `Rank@K`.
pub const RANK_CUTOFFS: [usize; 6] = [1, 3, 5, 10, 20, 40];

/// Selecting a chunk ranked beyond this position for an answerable question counts as a
/// hallucination.
pub const HALLUCINATION_RECALL_K: usize = 5;

pub const DEFAULT_QUERY_CACHE_CAPACITY: u64 = 4_096;

/// Functions listed in a synthesized per-file summary chunk.
pub const FILE_SUMMARY_MAX_FUNCTIONS: usize = 30;
pub const FILE_SUMMARY_SIGNATURE_CHARS: usize = 150;
pub const FILE_SUMMARY_DOC_CHARS: usize = 200;
