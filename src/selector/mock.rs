//! Scripted selection capabilities for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LanguageModel, SelectionOutcome, Selector, SelectorError};
use crate::scoring::RankedResult;
use crate::store::ChunkStore;

/// Replies with the first rule whose needle occurs in the prompt, else `default`.
pub struct ScriptedLanguageModel {
    model_id: String,
    rules: Vec<(String, String)>,
    default: String,
    delay: Option<Duration>,
    fail_with: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLanguageModel {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            model_id: "scripted".to_string(),
            rules: Vec::new(),
            default: default.into(),
            delay: None,
            fail_with: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::new("")
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, SelectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.fail_with {
            return Err(SelectorError::Provider(reason.clone()));
        }

        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Always asserts the top-ranked result, or a fixed outcome when the list is empty.
#[derive(Debug, Clone)]
pub struct FixedSelector {
    when_empty: SelectionOutcome,
}

impl FixedSelector {
    pub fn new(when_empty: SelectionOutcome) -> Self {
        Self { when_empty }
    }
}

impl Default for FixedSelector {
    fn default() -> Self {
        Self::new(SelectionOutcome::no_match())
    }
}

#[async_trait]
impl Selector for FixedSelector {
    async fn select(
        &self,
        _query: &str,
        results: &[RankedResult],
        _store: &ChunkStore,
    ) -> SelectionOutcome {
        match results.first() {
            Some(top) => SelectionOutcome::chunk(0, top.id().clone()),
            None => self.when_empty.clone(),
        }
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}
