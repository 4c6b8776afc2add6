//! Per-query orchestration.
//!
//! ```text
//! query ──► variants ──┬─► embed ─► vector scores ─┐
//!                      └─► BM25 scores ────────────┴─► fuse ─► rerank ─► select
//! ```
//!
//! Vector and lexical scoring of every variant run concurrently on blocking workers; fusion
//! waits for all of them. Each stage is a suspension point where the query's
//! [`CancellationToken`] is honoured.

pub mod error;
pub mod index;


pub use error::{PipelineError, PipelineResult};
pub use index::{IndexHandle, SearchIndex};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::chunk::{ChunkId, ChunkInput, KindTag};
use crate::config::PipelineConfig;
use crate::constants::TWO_STAGE_FILE_WEIGHT;
use crate::embedding::{CrossEncoder, Embedder, EmbeddingError};
use crate::fusion::{FusionConfig, QueryExpander, QueryRequest, TemplateExpander, VariantScores, fuse};
use crate::lexical::Bm25Params;
use crate::rerank::{
    FileScore, Reranker, aggregate_by_file, blend_file_scores, files_from_summaries,
    rank_by_file_weight,
};
use crate::scoring::{FusedCandidate, RankedResult, ScoredCandidate};
use crate::selector::{SelectionOutcome, Selector};
use crate::store::{ChunkStore, IndexPolicy};
use crate::vector;

/// Everything retrieval produced for one query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieval {
    pub request: Option<QueryRequest>,
    /// Fused pool, in fused order.
    pub fused: Vec<FusedCandidate>,
    /// Re-ranked pool, in final order.
    pub results: Vec<RankedResult>,
    /// File scores blended into `results` when file-aware ranking is on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileScore>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Retrieval plus the selector's decision.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub retrieval: Retrieval,
    pub selection: SelectionOutcome,
    /// The index this answer was computed against. A concurrent reindex does not change it.
    #[serde(skip)]
    pub index: Arc<SearchIndex>,
}

pub struct RetrievalPipeline {
    config: Arc<PipelineConfig>,
    fusion: FusionConfig,
    index: IndexHandle,
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
    selector: Arc<dyn Selector>,
    expander: Option<Arc<dyn QueryExpander>>,
}

impl std::fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("config", &self.config)
            .field("embedder", &self.embedder.model_id())
            .field("reranker", &self.reranker)
            .field("selector", &self.selector.describe())
            .field("expansion", &self.expander.is_some())
            .finish()
    }
}

impl RetrievalPipeline {
    /// Validates `config` and checks that `embedder` produced `store`; both failures are fatal.
    pub fn new(
        config: PipelineConfig,
        store: ChunkStore,
        embedder: Arc<dyn Embedder>,
        encoder: Arc<dyn CrossEncoder>,
        selector: Arc<dyn Selector>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        store.check_embedder(embedder.as_ref())?;

        let expander: Option<Arc<dyn QueryExpander>> = config
            .use_query_expansion
            .then(|| Arc::new(TemplateExpander) as Arc<dyn QueryExpander>);
        let reranker = Reranker::from_config(encoder, &config);
        let index = SearchIndex::new(store, bm25_params(&config));

        info!(
            chunks = index.store().len(),
            model_id = %embedder.model_id(),
            selector = %selector.describe(),
            reranker_available = reranker.is_available(),
            "Retrieval pipeline ready"
        );

        Ok(Self {
            fusion: FusionConfig::from(&config),
            config: Arc::new(config),
            index: IndexHandle::new(index),
            embedder,
            reranker,
            selector,
            expander,
        })
    }

    /// Replaces the query expander (`None` disables expansion).
    pub fn with_expander(mut self, expander: Option<Arc<dyn QueryExpander>>) -> Self {
        self.expander = expander;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn selector_description(&self) -> String {
        self.selector.describe()
    }

    /// The index queries currently run against.
    pub fn index(&self) -> Arc<SearchIndex> {
        self.index.current()
    }

    /// Checks everything that would make every query fail: configuration, embedder identity
    /// and the width of a freshly computed query embedding.
    pub async fn preflight(&self) -> PipelineResult<()> {
        self.config.validate()?;
        let index = self.index.current();
        index.store().check_embedder(self.embedder.as_ref())?;

        let embedder = Arc::clone(&self.embedder);
        let sample = tokio::task::spawn_blocking(move || embedder.embed("preflight"))
            .await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()))??;
        if sample.len() != index.store().embedding_dim() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: index.store().embedding_dim(),
                actual: sample.len(),
            }
            .into());
        }

        if !self.reranker.is_available() {
            warn!("Re-ranker model unavailable; every non-empty query will fail");
        }
        Ok(())
    }

    /// Scores, fuses and re-ranks. An empty query or an empty index yields an empty retrieval.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str, cancel: &CancellationToken) -> PipelineResult<Retrieval> {
        cancellable(cancel, self.retrieve_inner(query)).await
    }

    /// [`retrieve`](Self::retrieve) followed by answer selection.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn answer(&self, query: &str, cancel: &CancellationToken) -> PipelineResult<Answer> {
        cancellable(cancel, async {
            let index = self.index.current();
            let retrieval = self.retrieve_with(&index, query).await?;
            let selection = self
                .selector
                .select(query, &retrieval.results, index.store())
                .await;
            Ok(Answer {
                retrieval,
                selection,
                index,
            })
        })
        .await
    }

    /// Top `k` files. With two-stage retrieval on, files are ranked by their summary chunk;
    /// otherwise by aggregated rerank score.
    pub async fn retrieve_files(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<FileScore>> {
        cancellable(cancel, async {
            let index = self.index.current();
            let retrieval = self.retrieve_with(&index, query).await?;
            Ok(self.rank_files(index.store(), &retrieval.results, k))
        })
        .await
    }

    /// Finds the top [`file_retrieval_top_k`](PipelineConfig::file_retrieval_top_k) files,
    /// then re-ranks every chunk they contain and orders those by an even blend of file score
    /// and rerank score. Returns at most `k` results.
    #[instrument(skip_all, fields(query_len = query.len(), k = k))]
    pub async fn retrieve_two_stage(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<RankedResult>> {
        cancellable(cancel, async {
            let index = self.index.current();
            let retrieval = self.retrieve_with(&index, query).await?;
            let files = self.rank_files(
                index.store(),
                &retrieval.results,
                self.config.file_retrieval_top_k,
            );
            if files.is_empty() {
                debug!("No relevant files found");
                return Ok(Vec::new());
            }

            let pool = file_pool(index.store(), &files, &retrieval.fused);
            if pool.is_empty() {
                debug!(files = files.len(), "No chunks found in top files");
                return Ok(Vec::new());
            }
            debug!(files = files.len(), pool = pool.len(), "Re-ranking chunks of top files");

            let mut results = self
                .reranker
                .rerank(query.trim(), pool, Arc::clone(index.store()))
                .await?;
            let by_path: HashMap<&str, f32> =
                files.iter().map(|f| (f.path.as_str(), f.score)).collect();
            blend_file_scores(&mut results, index.store(), &by_path, TWO_STAGE_FILE_WEIGHT);
            results.truncate(k);
            Ok(results)
        })
        .await
    }

    /// Builds a new index from `inputs` and swaps it in. Queries already running finish
    /// against the old index.
    pub async fn reindex(&self, inputs: Vec<ChunkInput>) -> PipelineResult<()> {
        let embedder = Arc::clone(&self.embedder);
        let policy = IndexPolicy::from(self.config.as_ref());
        let params = bm25_params(&self.config);

        let index = tokio::task::spawn_blocking(move || {
            ChunkStore::build(inputs, embedder.as_ref(), policy)
                .map(|store| SearchIndex::new(store, params))
        })
        .await
        .map_err(|e| PipelineError::TaskFailed(e.to_string()))??;

        let chunks = index.store().len();
        let previous = self.index.replace(index);
        info!(chunks, previous = previous.store().len(), "Index replaced");
        Ok(())
    }

    /// Swaps in an already built store (for example one loaded from a snapshot).
    pub fn replace_store(&self, store: ChunkStore) -> PipelineResult<()> {
        store.check_embedder(self.embedder.as_ref())?;
        self.index
            .replace(SearchIndex::new(store, bm25_params(&self.config)));
        Ok(())
    }

    fn rank_files(&self, store: &ChunkStore, results: &[RankedResult], k: usize) -> Vec<FileScore> {
        if self.config.use_two_stage_file_retrieval {
            if !self.config.use_file_summary_chunks {
                warn!("Two-stage file retrieval needs file summary chunks; aggregating chunk scores");
            } else {
                let mut files = files_from_summaries(results, store);
                if !files.is_empty() {
                    files.truncate(k);
                    return files;
                }
                warn!("No file summary chunks retrieved; aggregating chunk scores");
            }
        }
        let mut files = aggregate_by_file(results, store, self.config.file_aggregation);
        files.truncate(k);
        files
    }

    async fn retrieve_inner(&self, query: &str) -> PipelineResult<Retrieval> {
        let index = self.index.current();
        self.retrieve_with(&index, query).await
    }

    async fn retrieve_with(&self, index: &Arc<SearchIndex>, query: &str) -> PipelineResult<Retrieval> {
        let query = query.trim();
        if query.is_empty() || index.store().is_empty() {
            debug!(corpus = index.store().len(), "Nothing to retrieve");
            return Ok(Retrieval::default());
        }

        let started = Instant::now();
        let request = QueryRequest::expanded(query, self.expander.as_deref());
        let variants = try_join_all(
            request
                .variants()
                .into_iter()
                .map(|variant| self.score_variant(index, variant.to_string())),
        )
        .await?;

        let fused = fuse(&variants, index.store(), &self.fusion);
        let mut results = self
            .reranker
            .rerank(query, fused.clone(), Arc::clone(index.store()))
            .await?;
        let files = if self.config.use_file_score_aggregation {
            rank_by_file_weight(
                &mut results,
                index.store(),
                self.config.file_aggregation,
                self.config.file_vs_function_weight,
            )
        } else {
            Vec::new()
        };

        debug!(
            variants = variants.len(),
            pool = fused.len(),
            top = results.first().map(|r| r.id().as_str()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieval complete"
        );

        Ok(Retrieval {
            request: Some(request),
            fused,
            results,
            files,
        })
    }

    /// Vector and lexical scores for one variant, computed concurrently.
    async fn score_variant(
        &self,
        index: &Arc<SearchIndex>,
        variant: String,
    ) -> PipelineResult<VariantScores> {
        let embedder = Arc::clone(&self.embedder);
        let store = Arc::clone(index.store());
        let bm25 = Arc::clone(index.bm25());
        let vector_query = variant.clone();
        let lexical_query = variant.clone();

        let vector_task = tokio::task::spawn_blocking(move || -> PipelineResult<Vec<ScoredCandidate>> {
            let embedding = embedder.embed(&vector_query)?;
            Ok(vector::score(&embedding, &store)?)
        });
        let lexical_task = tokio::task::spawn_blocking(move || bm25.score(&lexical_query));

        let (vector, lexical) = tokio::join!(vector_task, lexical_task);
        let vector = vector.map_err(|e| PipelineError::TaskFailed(e.to_string()))??;
        let lexical = lexical.map_err(|e| PipelineError::TaskFailed(e.to_string()))?;

        Ok(VariantScores {
            query: variant,
            vector,
            lexical,
        })
    }
}

/// Every non-summary chunk of `files`: those already in `fused` first, in fused order, then
/// the rest in store order. Fused ranks are renumbered over the new pool.
fn file_pool(store: &ChunkStore, files: &[FileScore], fused: &[FusedCandidate]) -> Vec<FusedCandidate> {
    let paths: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
    let in_files = |id: &ChunkId| {
        store.lookup(id).is_some_and(|record| {
            record.kind().tag() != KindTag::FileSummary
                && paths.contains(record.location().normalized_path().as_str())
        })
    };

    let mut seen = HashSet::new();
    let mut pool: Vec<FusedCandidate> = fused
        .iter()
        .filter(|c| in_files(&c.id) && seen.insert(c.id.clone()))
        .cloned()
        .collect();
    for record in store.iter() {
        if in_files(record.id()) && seen.insert(record.id().clone()) {
            pool.push(FusedCandidate::unscored(record.id().clone(), 0));
        }
    }
    for (i, candidate) in pool.iter_mut().enumerate() {
        candidate.fused_rank = i + 1;
    }
    pool
}

fn bm25_params(config: &PipelineConfig) -> Bm25Params {
    Bm25Params::new(config.bm25_k1, config.bm25_b)
}

/// Runs `work` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = work => result,
    }
}
