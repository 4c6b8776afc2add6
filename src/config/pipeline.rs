//! Retrieval and selection options.
//!
//! A [`PipelineConfig`] is built once (defaults, then `CODERANK_*` overrides), validated, and
//! shared read-only by every stage.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use super::ConfigError;
use super::env::{parse_bool, parse_from_env, parse_string};
use crate::constants::{
    DEFAULT_BATCH_RANKING_SIZE, DEFAULT_BM25_B, DEFAULT_BM25_K1, DEFAULT_CANDIDATE_POOL_SIZE,
    DEFAULT_EVAL_WORKERS, DEFAULT_FILE_RETRIEVAL_TOP_K, DEFAULT_FILE_VS_FUNCTION_WEIGHT,
    DEFAULT_FUSION_ALPHA, DEFAULT_INDIVIDUAL_TOP_N, DEFAULT_LLM_MODEL,
    DEFAULT_LLM_TIMEOUT_SECS, DEFAULT_NAME_BOOST, MAX_BATCH_RANKING_SIZE,
};

/// Prompting policy used by the LLM answer selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Multiple choice with worked exemplars before the real question.
    Aggressive,
    /// Multiple choice without exemplars.
    #[default]
    AggressiveNoFewshot,
    /// Per-candidate YES/NO filter, then a numbered choice among survivors.
    Conservative,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::AggressiveNoFewshot => "aggressive_no_fewshot",
            Self::Conservative => "conservative",
        }
    }

    pub fn uses_few_shot(&self) -> bool {
        matches!(self, Self::Aggressive)
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "aggressive_no_fewshot" | "aggressive-no-fewshot" => Ok(Self::AggressiveNoFewshot),
            "conservative" => Ok(Self::Conservative),
            _ => Err(ConfigError::UnknownSelectionMode {
                value: s.to_string(),
            }),
        }
    }
}

/// How chunk-level rerank scores collapse into one score per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAggregation {
    #[default]
    Max,
    Mean,
    /// `mean + 0.5 * max`
    Weighted,
    /// `sum / sqrt(n)`
    Count,
}

impl FileAggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Weighted => "weighted",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for FileAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileAggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "weighted" => Ok(Self::Weighted),
            "count" => Ok(Self::Count),
            _ => Err(ConfigError::UnknownAggregation {
                value: s.to_string(),
            }),
        }
    }
}

/// Immutable option set for indexing, retrieval, re-ranking, selection and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Add [`name_boost`](Self::name_boost) when a query token equals a chunk's symbol name.
    pub use_function_name_boosting: bool,
    /// Feed the cross-encoder the chunk signature instead of its full text.
    pub use_signature_only: bool,
    /// Score paraphrased query variants and keep the best score per chunk.
    pub use_query_expansion: bool,
    pub candidate_pool_size: usize,
    /// Synthesize one summary chunk per source file at index time.
    pub use_file_summary_chunks: bool,
    /// Index struct and enum chunks alongside functions.
    pub index_type_chunks: bool,
    /// Run the LLM answer selector. When off, rank 1 is the answer.
    pub use_llm: bool,
    /// Select with [`finetuned_llm_model`](Self::finetuned_llm_model) instead of
    /// [`llm_model`](Self::llm_model).
    pub use_finetuned: bool,
    /// One multiple-choice prompt instead of one prompt per candidate.
    pub use_batch_ranking: bool,
    pub llm_selection_mode: SelectionMode,
    pub batch_ranking_size: usize,
    pub individual_top_n: usize,
    pub fusion_alpha: f32,
    pub name_boost: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub file_aggregation: FileAggregation,
    /// Re-order chunk results by a blend of their file's aggregated score and their own.
    pub use_file_score_aggregation: bool,
    /// Share of the file score in that blend; `0.0` is pure chunk ranking.
    pub file_vs_function_weight: f32,
    /// File ranking reads synthesized file-summary chunks instead of aggregating chunk scores,
    /// and two-stage retrieval re-ranks every chunk of the top files.
    pub use_two_stage_file_retrieval: bool,
    /// Files kept by the first stage of two-stage retrieval.
    pub file_retrieval_top_k: usize,
    /// Concurrent cross-encoder calls per query.
    pub rerank_workers: usize,
    /// Concurrent queries during evaluation.
    pub eval_workers: usize,
    pub llm_timeout: Duration,
    pub llm_model: String,
    pub finetuned_llm_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_function_name_boosting: true,
            use_signature_only: true,
            use_query_expansion: true,
            candidate_pool_size: DEFAULT_CANDIDATE_POOL_SIZE,
            use_file_summary_chunks: true,
            index_type_chunks: true,
            use_llm: true,
            use_finetuned: false,
            use_batch_ranking: true,
            llm_selection_mode: SelectionMode::default(),
            batch_ranking_size: DEFAULT_BATCH_RANKING_SIZE,
            individual_top_n: DEFAULT_INDIVIDUAL_TOP_N,
            fusion_alpha: DEFAULT_FUSION_ALPHA,
            name_boost: DEFAULT_NAME_BOOST,
            bm25_k1: DEFAULT_BM25_K1,
            bm25_b: DEFAULT_BM25_B,
            file_aggregation: FileAggregation::default(),
            use_file_score_aggregation: false,
            file_vs_function_weight: DEFAULT_FILE_VS_FUNCTION_WEIGHT,
            use_two_stage_file_retrieval: false,
            file_retrieval_top_k: DEFAULT_FILE_RETRIEVAL_TOP_K,
            rerank_workers: default_workers(),
            eval_workers: DEFAULT_EVAL_WORKERS,
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            finetuned_llm_model: format!("{DEFAULT_LLM_MODEL}-finetuned"),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl PipelineConfig {
    const ENV_NAME_BOOSTING: &'static str = "CODERANK_USE_FUNCTION_NAME_BOOSTING";
    const ENV_SIGNATURE_ONLY: &'static str = "CODERANK_USE_SIGNATURE_ONLY";
    const ENV_QUERY_EXPANSION: &'static str = "CODERANK_USE_QUERY_EXPANSION";
    const ENV_POOL_SIZE: &'static str = "CODERANK_CANDIDATE_POOL_SIZE";
    const ENV_FILE_SUMMARIES: &'static str = "CODERANK_USE_FILE_SUMMARY_CHUNKS";
    const ENV_TYPE_CHUNKS: &'static str = "CODERANK_INDEX_TYPE_CHUNKS";
    const ENV_USE_LLM: &'static str = "CODERANK_USE_LLM";
    const ENV_USE_FINETUNED: &'static str = "CODERANK_USE_FINETUNED";
    const ENV_BATCH_RANKING: &'static str = "CODERANK_USE_BATCH_RANKING";
    const ENV_SELECTION_MODE: &'static str = "CODERANK_LLM_SELECTION_MODE";
    const ENV_BATCH_SIZE: &'static str = "CODERANK_BATCH_RANKING_SIZE";
    const ENV_INDIVIDUAL_TOP_N: &'static str = "CODERANK_INDIVIDUAL_TOP_N";
    const ENV_FUSION_ALPHA: &'static str = "CODERANK_FUSION_ALPHA";
    const ENV_NAME_BOOST: &'static str = "CODERANK_NAME_BOOST";
    const ENV_BM25_K1: &'static str = "CODERANK_BM25_K1";
    const ENV_BM25_B: &'static str = "CODERANK_BM25_B";
    const ENV_FILE_AGGREGATION: &'static str = "CODERANK_FILE_AGGREGATION";
    const ENV_FILE_SCORE_AGGREGATION: &'static str = "CODERANK_USE_FILE_SCORE_AGGREGATION";
    const ENV_FILE_WEIGHT: &'static str = "CODERANK_FILE_VS_FUNCTION_WEIGHT";
    const ENV_TWO_STAGE: &'static str = "CODERANK_USE_TWO_STAGE_FILE_RETRIEVAL";
    const ENV_FILE_TOP_K: &'static str = "CODERANK_FILE_RETRIEVAL_TOP_K";
    const ENV_RERANK_WORKERS: &'static str = "CODERANK_RERANK_WORKERS";
    const ENV_EVAL_WORKERS: &'static str = "CODERANK_EVAL_WORKERS";
    const ENV_LLM_TIMEOUT_SECS: &'static str = "CODERANK_LLM_TIMEOUT_SECS";
    const ENV_LLM_MODEL: &'static str = "CODERANK_LLM_MODEL";
    const ENV_FINETUNED_LLM_MODEL: &'static str = "CODERANK_FINETUNED_LLM_MODEL";

    /// Loads options from environment variables (falling back to defaults).
    /// Malformed values are errors, never replaced by the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            use_function_name_boosting: parse_bool(
                Self::ENV_NAME_BOOSTING,
                d.use_function_name_boosting,
            )?,
            use_signature_only: parse_bool(Self::ENV_SIGNATURE_ONLY, d.use_signature_only)?,
            use_query_expansion: parse_bool(Self::ENV_QUERY_EXPANSION, d.use_query_expansion)?,
            candidate_pool_size: parse_from_env(Self::ENV_POOL_SIZE, d.candidate_pool_size)?,
            use_file_summary_chunks: parse_bool(
                Self::ENV_FILE_SUMMARIES,
                d.use_file_summary_chunks,
            )?,
            index_type_chunks: parse_bool(Self::ENV_TYPE_CHUNKS, d.index_type_chunks)?,
            use_llm: parse_bool(Self::ENV_USE_LLM, d.use_llm)?,
            use_finetuned: parse_bool(Self::ENV_USE_FINETUNED, d.use_finetuned)?,
            use_batch_ranking: parse_bool(Self::ENV_BATCH_RANKING, d.use_batch_ranking)?,
            llm_selection_mode: match std::env::var(Self::ENV_SELECTION_MODE) {
                Ok(value) => value.parse()?,
                Err(_) => d.llm_selection_mode,
            },
            batch_ranking_size: parse_from_env(Self::ENV_BATCH_SIZE, d.batch_ranking_size)?,
            individual_top_n: parse_from_env(Self::ENV_INDIVIDUAL_TOP_N, d.individual_top_n)?,
            fusion_alpha: parse_from_env(Self::ENV_FUSION_ALPHA, d.fusion_alpha)?,
            name_boost: parse_from_env(Self::ENV_NAME_BOOST, d.name_boost)?,
            bm25_k1: parse_from_env(Self::ENV_BM25_K1, d.bm25_k1)?,
            bm25_b: parse_from_env(Self::ENV_BM25_B, d.bm25_b)?,
            file_aggregation: match std::env::var(Self::ENV_FILE_AGGREGATION) {
                Ok(value) => value.parse()?,
                Err(_) => d.file_aggregation,
            },
            use_file_score_aggregation: parse_bool(
                Self::ENV_FILE_SCORE_AGGREGATION,
                d.use_file_score_aggregation,
            )?,
            file_vs_function_weight: parse_from_env(
                Self::ENV_FILE_WEIGHT,
                d.file_vs_function_weight,
            )?,
            use_two_stage_file_retrieval: parse_bool(
                Self::ENV_TWO_STAGE,
                d.use_two_stage_file_retrieval,
            )?,
            file_retrieval_top_k: parse_from_env(Self::ENV_FILE_TOP_K, d.file_retrieval_top_k)?,
            rerank_workers: parse_from_env(Self::ENV_RERANK_WORKERS, d.rerank_workers)?,
            eval_workers: parse_from_env(Self::ENV_EVAL_WORKERS, d.eval_workers)?,
            llm_timeout: Duration::from_secs(parse_from_env(
                Self::ENV_LLM_TIMEOUT_SECS,
                d.llm_timeout.as_secs(),
            )?),
            llm_model: parse_string(Self::ENV_LLM_MODEL, d.llm_model),
            finetuned_llm_model: parse_string(
                Self::ENV_FINETUNED_LLM_MODEL,
                d.finetuned_llm_model,
            ),
        })
    }

    /// Checks numeric ranges. Called by the pipeline before any query runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fusion_alpha) {
            return Err(ConfigError::InvalidFusionAlpha {
                value: self.fusion_alpha,
            });
        }
        if !self.name_boost.is_finite() || self.name_boost < 0.0 {
            return Err(ConfigError::InvalidNameBoost {
                value: self.name_boost,
            });
        }
        if self.use_function_name_boosting && self.name_boost == 0.0 {
            return Err(ConfigError::ZeroNameBoost);
        }
        if !(0.0..=1.0).contains(&self.file_vs_function_weight) {
            return Err(ConfigError::InvalidFileWeight {
                value: self.file_vs_function_weight,
            });
        }
        if self.candidate_pool_size == 0 {
            return Err(ConfigError::EmptyCandidatePool);
        }
        if self.batch_ranking_size == 0 || self.batch_ranking_size > MAX_BATCH_RANKING_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                value: self.batch_ranking_size,
                max: MAX_BATCH_RANKING_SIZE,
            });
        }
        if self.individual_top_n == 0 {
            return Err(ConfigError::ZeroWorkers {
                name: "individual_top_n",
            });
        }
        if self.file_retrieval_top_k == 0 {
            return Err(ConfigError::ZeroWorkers {
                name: "file_retrieval_top_k",
            });
        }
        if self.rerank_workers == 0 {
            return Err(ConfigError::ZeroWorkers {
                name: "rerank_workers",
            });
        }
        if self.eval_workers == 0 {
            return Err(ConfigError::ZeroWorkers {
                name: "eval_workers",
            });
        }
        if !self.bm25_k1.is_finite() || self.bm25_k1 < 0.0 {
            return Err(ConfigError::InvalidBm25 {
                name: "k1",
                value: self.bm25_k1,
            });
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(ConfigError::InvalidBm25 {
                name: "b",
                value: self.bm25_b,
            });
        }
        Ok(())
    }

    /// Model id the LLM selector should call.
    pub fn selector_model(&self) -> &str {
        if self.use_finetuned {
            &self.finetuned_llm_model
        } else {
            &self.llm_model
        }
    }
}
