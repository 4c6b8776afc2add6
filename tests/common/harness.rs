//! Pipeline harness built from deterministic stub capabilities.

use std::sync::Arc;

use coderank::chunk::ChunkInput;
use coderank::config::PipelineConfig;
use coderank::embedding::mock::FnCrossEncoder;
use coderank::embedding::{BertEmbedder, CrossEncoder, Embedder};
use coderank::pipeline::RetrievalPipeline;
use coderank::selector::{Selector, TopRankSelector};
use coderank::store::{ChunkStore, IndexPolicy};

pub const STUB_EMBEDDING_DIM: usize = 32;

/// Retrieval-only settings: no expansion, no synthesized summaries, two re-rank workers.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        use_query_expansion: false,
        use_file_summary_chunks: false,
        use_llm: false,
        rerank_workers: 2,
        eval_workers: 2,
        ..PipelineConfig::default()
    }
}

pub fn stub_embedder() -> Arc<dyn Embedder> {
    Arc::new(BertEmbedder::stub(STUB_EMBEDDING_DIM).expect("stub embedder"))
}

/// Scores a candidate by how many query words occur in its text (case-insensitive).
pub fn overlap_encoder() -> Arc<dyn CrossEncoder> {
    Arc::new(FnCrossEncoder::new(|query: &str, text: &str| {
        let text = text.to_lowercase();
        query
            .split_whitespace()
            .filter(|word| text.contains(&word.to_lowercase()))
            .count() as f32
    }))
}

/// Gives every candidate the same score, so the final order is the fused order.
pub fn constant_encoder(score: f32) -> Arc<dyn CrossEncoder> {
    Arc::new(FnCrossEncoder::new(move |_: &str, _: &str| score))
}

pub fn build_store(config: &PipelineConfig, inputs: Vec<ChunkInput>) -> ChunkStore {
    ChunkStore::build(inputs, stub_embedder().as_ref(), IndexPolicy::from(config))
        .expect("store build")
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    inputs: Vec<ChunkInput>,
    encoder: Arc<dyn CrossEncoder>,
    selector: Arc<dyn Selector>,
}

impl PipelineBuilder {
    pub fn new(inputs: Vec<ChunkInput>) -> Self {
        Self {
            config: test_config(),
            inputs,
            encoder: overlap_encoder(),
            selector: Arc::new(TopRankSelector),
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn selector(mut self, selector: Arc<dyn Selector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn build(self) -> RetrievalPipeline {
        let store = build_store(&self.config, self.inputs);
        RetrievalPipeline::new(
            self.config,
            store,
            stub_embedder(),
            self.encoder,
            self.selector,
        )
        .expect("pipeline")
    }

    pub fn build_shared(self) -> Arc<RetrievalPipeline> {
        Arc::new(self.build())
    }
}
