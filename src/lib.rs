//! Coderank library crate (used by the binary and integration tests).
//!
//! Hybrid code search over a chunked codebase:
//!
//! ```text
//! chunks ─► store ─┬─► lexical (BM25) ─┐
//!                  └─► vector (cosine) ─┴─► fusion ─► rerank ─► selector ─► eval
//! ```
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`ChunkInput`], [`ChunkRecord`], [`ChunkKind`] - Indexable units
//! - [`ChunkStore`] - Read-only chunk set with embeddings, persisted as an rkyv snapshot
//! - [`PipelineConfig`], [`Config`] - Retrieval options and binary paths
//!
//! ## Retrieval
//! - [`Bm25Index`] - Lexical scorer
//! - [`vector::score`] - Vector scorer
//! - [`fusion::fuse`] - Candidate fusion
//! - [`Reranker`] - Cross-encoder re-ranking
//! - [`RetrievalPipeline`] - Per-query orchestration
//!
//! ## Selection & Evaluation
//! - [`Selector`], [`LlmSelector`], [`TopRankSelector`] - Answer selection
//! - [`Evaluator`], [`Metrics`], [`EvaluationReport`] - Labelled evaluation runs
//!
//! ## Model Capabilities
//! - [`Embedder`], [`CrossEncoder`] - Model seams, with BERT backends and stub modes
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod chunk;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod eval;
pub mod fusion;
pub mod hashing;
pub mod lexical;
pub mod pipeline;
pub mod rerank;
pub mod scoring;
pub mod selector;
pub mod store;
pub mod vector;

pub use chunk::{ChunkId, ChunkInput, ChunkKind, ChunkRecord, KindTag, SourceLocation};
pub use config::{Config, ConfigError, FileAggregation, PipelineConfig, SelectionMode};
pub use embedding::{
    BertCrossEncoder, BertEmbedder, CachedEmbedder, CrossEncoder, CrossEncoderError, Embedder,
    EmbeddingError,
};
pub use eval::{
    EvalError, EvaluationCase, EvaluationRecord, EvaluationReport, Evaluator, GroundTruth,
    Metrics, load_dataset,
};
pub use fusion::{FusionConfig, QueryExpander, QueryRequest, TemplateExpander};
pub use hashing::{IndexFingerprint, hash_query, hash_to_u64};
pub use lexical::{Bm25Index, Bm25Params, tokenize};
pub use pipeline::{Answer, PipelineError, Retrieval, RetrievalPipeline};
pub use rerank::{FileScore, RerankError, Reranker};
pub use scoring::{FusedCandidate, RankedResult, ScoredCandidate};
pub use selector::{
    GenaiModel, LanguageModel, LlmSelector, Selection, SelectionOutcome, SelectionStrategy,
    Selector, SelectorError, TopRankSelector,
};
pub use store::{ChunkStore, IndexPolicy, StoreError};
pub use vector::VectorError;

#[cfg(any(test, feature = "mock"))]
pub use embedding::mock::{FixedEmbedder, FnCrossEncoder, UnavailableCrossEncoder};
#[cfg(any(test, feature = "mock"))]
pub use selector::mock::{FixedSelector, ScriptedLanguageModel};
