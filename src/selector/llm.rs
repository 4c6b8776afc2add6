use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use super::parse::{parse_confidence, parse_numbered_choice, parse_option_letter, parse_yes};
use super::{LanguageModel, SelectionOutcome, Selector, SelectorError, prompt};
use crate::chunk::ChunkRecord;
use crate::config::{PipelineConfig, SelectionMode};
use crate::constants::{
    DEFAULT_BATCH_RANKING_SIZE, DEFAULT_INDIVIDUAL_TOP_N, DEFAULT_LLM_TIMEOUT_SECS,
};
use crate::scoring::RankedResult;
use crate::store::ChunkStore;

const BATCH_MAX_TOKENS: u32 = 10;
const YES_NO_MAX_TOKENS: u32 = 3;
const CHOICE_MAX_TOKENS: u32 = 3;
const CONFIDENCE_MAX_TOKENS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// One multiple-choice call over the top candidates.
    Batch,
    /// One confidence call per candidate.
    Individual,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Batch => "batch",
            Self::Individual => "individual",
        })
    }
}

/// Language-model backed selection.
///
/// Every model call runs under `timeout`. Any failed call turns the whole selection into a
/// failed "no match".
#[derive(Clone)]
pub struct LlmSelector {
    model: Arc<dyn LanguageModel>,
    strategy: SelectionStrategy,
    mode: SelectionMode,
    batch_size: usize,
    individual_top_n: usize,
    timeout: Duration,
}

impl fmt::Debug for LlmSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSelector")
            .field("model", &self.model.model_id())
            .field("strategy", &self.strategy)
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("individual_top_n", &self.individual_top_n)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmSelector {
    pub fn new(model: Arc<dyn LanguageModel>, strategy: SelectionStrategy, mode: SelectionMode) -> Self {
        Self {
            model,
            strategy,
            mode,
            batch_size: DEFAULT_BATCH_RANKING_SIZE,
            individual_top_n: DEFAULT_INDIVIDUAL_TOP_N,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        let strategy = if config.use_batch_ranking {
            SelectionStrategy::Batch
        } else {
            SelectionStrategy::Individual
        };
        Self::new(model, strategy, config.llm_selection_mode)
            .with_batch_size(config.batch_ranking_size)
            .with_individual_top_n(config.individual_top_n)
            .with_timeout(config.llm_timeout)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_individual_top_n(mut self, top_n: usize) -> Self {
        self.individual_top_n = top_n.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    async fn call(&self, prompt: &str, max_tokens: u32) -> Result<String, SelectorError> {
        match tokio::time::timeout(self.timeout, self.model.complete(prompt, max_tokens)).await {
            Ok(result) => result,
            Err(_) => Err(SelectorError::Timeout {
                after: self.timeout,
            }),
        }
    }

    /// Top `n` results that still resolve in `store`, with their list positions.
    fn candidates<'a>(
        results: &[RankedResult],
        store: &'a ChunkStore,
        n: usize,
    ) -> Vec<(usize, &'a ChunkRecord)> {
        results
            .iter()
            .enumerate()
            .take(n)
            .filter_map(|(index, result)| match store.lookup(result.id()) {
                Some(record) => Some((index, record)),
                None => {
                    warn!(chunk_id = %result.id(), "Ranked result missing from store; skipped");
                    None
                }
            })
            .collect()
    }

    async fn select_batch(
        &self,
        query: &str,
        candidates: &[(usize, &ChunkRecord)],
    ) -> SelectionOutcome {
        let records: Vec<&ChunkRecord> = candidates.iter().map(|(_, r)| *r).collect();
        let prompt = prompt::batch(query, &records, self.mode.uses_few_shot());

        let response = match self.call(&prompt, BATCH_MAX_TOKENS).await {
            Ok(response) => response,
            Err(e) => return SelectionOutcome::failed(e),
        };

        let last = prompt::option_letter(records.len() - 1);
        match parse_option_letter(&response, last) {
            Some(letter) if letter != 'A' => {
                let (index, record) = candidates[usize::from(letter as u8 - b'B')];
                SelectionOutcome::chunk(index, record.id().clone()).with_raw_response(response)
            }
            _ => SelectionOutcome::no_match().with_raw_response(response),
        }
    }

    /// Phase one asks YES/NO per candidate; phase two picks among several survivors.
    async fn select_conservative(
        &self,
        query: &str,
        candidates: &[(usize, &ChunkRecord)],
    ) -> SelectionOutcome {
        let checks = join_all(candidates.iter().map(|(_, record)| async move {
            let prompt = prompt::relevance_check(query, record);
            self.call(&prompt, YES_NO_MAX_TOKENS).await
        }))
        .await;

        let mut survivors = Vec::new();
        let mut replies = Vec::with_capacity(checks.len());
        for (candidate, check) in candidates.iter().zip(checks) {
            let reply = match check {
                Ok(reply) => reply,
                Err(e) => return SelectionOutcome::failed(e),
            };
            if parse_yes(&reply) {
                survivors.push(*candidate);
            }
            replies.push(reply);
        }

        debug!(
            candidates = candidates.len(),
            passed = survivors.len(),
            "Conservative phase one complete"
        );

        match survivors.as_slice() {
            [] => SelectionOutcome::no_match()
                .with_raw_response(format!("Phase 1: All NO - {replies:?}")),
            [(index, record)] => SelectionOutcome::chunk(*index, record.id().clone())
                .with_raw_response(format!("Phase 1: Only {} passed", record.display_name())),
            _ => {
                let records: Vec<&ChunkRecord> = survivors.iter().map(|(_, r)| *r).collect();
                let prompt = prompt::best_of(query, &records);
                let response = match self.call(&prompt, CHOICE_MAX_TOKENS).await {
                    Ok(response) => response,
                    Err(e) => return SelectionOutcome::failed(e),
                };
                let pick = parse_numbered_choice(&response, survivors.len()).unwrap_or(0);
                let (index, record) = survivors[pick];
                SelectionOutcome::chunk(index, record.id().clone()).with_raw_response(response)
            }
        }
    }

    async fn select_individual(
        &self,
        query: &str,
        candidates: &[(usize, &ChunkRecord)],
    ) -> SelectionOutcome {
        let replies = join_all(candidates.iter().map(|(_, record)| async move {
            let prompt = prompt::confidence(query, record);
            self.call(&prompt, CONFIDENCE_MAX_TOKENS).await
        }))
        .await;

        let mut best: Option<(usize, f32)> = None;
        let mut summary = String::from("EVALUATION RESULTS:\n");
        for (pos, reply) in replies.into_iter().enumerate() {
            let response = match reply {
                Ok(response) => response,
                Err(e) => return SelectionOutcome::failed(e),
            };
            let score = parse_confidence(&response);
            let _ = writeln!(
                summary,
                "{}: {score:.1}%",
                candidates[pos].1.display_name()
            );
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((pos, score));
            }
        }

        match best {
            Some((pos, score)) if score > 0.0 => {
                let (index, record) = candidates[pos];
                SelectionOutcome::chunk(index, record.id().clone())
                    .with_confidence(score)
                    .with_raw_response(summary)
            }
            _ => SelectionOutcome::no_match().with_raw_response(summary),
        }
    }
}

#[async_trait]
impl Selector for LlmSelector {
    #[instrument(skip_all, fields(strategy = %self.strategy, mode = %self.mode, results = results.len()))]
    async fn select(
        &self,
        query: &str,
        results: &[RankedResult],
        store: &ChunkStore,
    ) -> SelectionOutcome {
        let n = match self.strategy {
            SelectionStrategy::Batch => self.batch_size,
            SelectionStrategy::Individual => self.individual_top_n,
        };
        let candidates = Self::candidates(results, store, n);
        if candidates.is_empty() {
            return SelectionOutcome::no_match();
        }

        let outcome = match (self.strategy, self.mode) {
            (SelectionStrategy::Individual, _) => self.select_individual(query, &candidates).await,
            (SelectionStrategy::Batch, SelectionMode::Conservative) => {
                self.select_conservative(query, &candidates).await
            }
            (SelectionStrategy::Batch, _) => self.select_batch(query, &candidates).await,
        };

        match &outcome.error {
            Some(error) => warn!(error = %error, "Answer selection failed; reporting no match"),
            None => debug!(
                selected = outcome.selected_id().map(|id| id.as_str()),
                "Answer selection complete"
            ),
        }
        outcome
    }

    fn describe(&self) -> String {
        format!("llm:{}:{}:{}", self.model.model_id(), self.strategy, self.mode)
    }
}

/// [`LanguageModel`] over a `genai` client. The provider is inferred from the model name
/// (unknown names go to a local Ollama).
pub struct GenaiModel {
    client: Client,
    model: String,
}

impl GenaiModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_client(Client::default(), model)
    }

    pub fn with_client(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for GenaiModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, SelectorError> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        let options = ChatOptions::default()
            .with_max_tokens(max_tokens)
            .with_temperature(0.0);

        let response = self
            .client
            .exec_chat(&self.model, request, Some(&options))
            .await
            .map_err(|e| {
                error!(model = %self.model, "Provider error: {}", e);
                SelectorError::Provider(e.to_string())
            })?;

        let text = response.first_text().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(SelectorError::EmptyResponse);
        }
        Ok(text)
    }
}
