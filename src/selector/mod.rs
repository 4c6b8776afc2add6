//! Answer selection.
//!
//! Given the re-ranked list, decide which candidate (if any) answers the query. "No match" is an
//! ordinary outcome. Selector failures (timeouts, provider errors) also surface as "no match",
//! with [`SelectionOutcome::error`] set so evaluation can tell them apart from an abstention.

pub mod error;
mod llm;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod parse;
pub mod prompt;


pub use error::SelectorError;
pub use llm::{GenaiModel, LlmSelector, SelectionStrategy};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::chunk::ChunkId;
use crate::config::PipelineConfig;
use crate::scoring::RankedResult;
use crate::store::ChunkStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    /// `index` is the 0-based position in the ranked list the selector was given.
    Chunk { index: usize, id: ChunkId },
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub selection: Selection,
    /// Model confidence on a 0-100 scale, when the strategy produces one.
    pub confidence: Option<f32>,
    /// Set when the selector failed rather than abstained.
    pub error: Option<String>,
    pub raw_response: Option<String>,
}

impl SelectionOutcome {
    pub fn chunk(index: usize, id: ChunkId) -> Self {
        Self {
            selection: Selection::Chunk { index, id },
            confidence: None,
            error: None,
            raw_response: None,
        }
    }

    pub fn no_match() -> Self {
        Self {
            selection: Selection::NoMatch,
            confidence: None,
            error: None,
            raw_response: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::no_match()
        }
    }

    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn selected_id(&self) -> Option<&ChunkId> {
        match &self.selection {
            Selection::Chunk { id, .. } => Some(id),
            Selection::NoMatch => None,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self.selection, Selection::NoMatch)
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Picks the answer from a ranked list.
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(
        &self,
        query: &str,
        results: &[RankedResult],
        store: &ChunkStore,
    ) -> SelectionOutcome;

    /// Short label for logs and reports.
    fn describe(&self) -> String;
}

/// Text completion backend used by [`LlmSelector`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, SelectorError>;
}

/// Re-rank only: rank 1 is the answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopRankSelector;

#[async_trait]
impl Selector for TopRankSelector {
    async fn select(
        &self,
        _query: &str,
        results: &[RankedResult],
        _store: &ChunkStore,
    ) -> SelectionOutcome {
        match results.first() {
            Some(top) => SelectionOutcome::chunk(0, top.id().clone()),
            None => SelectionOutcome::no_match(),
        }
    }

    fn describe(&self) -> String {
        "top_rank".to_string()
    }
}

/// The selector `config` asks for: [`LlmSelector`] over `model` when `use_llm` is set, otherwise
/// [`TopRankSelector`].
pub fn from_config(config: &PipelineConfig, model: Arc<dyn LanguageModel>) -> Arc<dyn Selector> {
    if config.use_llm {
        Arc::new(LlmSelector::from_config(model, config))
    } else {
        Arc::new(TopRankSelector)
    }
}
