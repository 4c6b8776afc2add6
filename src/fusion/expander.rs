//! Query variants.

use serde::Serialize;

/// Produces paraphrases of a query. Each variant is scored on its own and the results are merged
/// by maximum fused score per chunk.
pub trait QueryExpander: Send + Sync {
    /// Variants other than the query itself.
    fn expand(&self, query: &str) -> Vec<String>;
}

/// `implement {q}` and `function that {q}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateExpander;

impl QueryExpander for TemplateExpander {
    fn expand(&self, query: &str) -> Vec<String> {
        vec![format!("implement {query}"), format!("function that {query}")]
    }
}

/// One retrieval call's query text plus its paraphrases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub text: String,
    pub expansions: Vec<String>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expansions: Vec::new(),
        }
    }

    /// Builds a request, expanding `text` when `expander` is given.
    pub fn expanded(text: impl Into<String>, expander: Option<&dyn QueryExpander>) -> Self {
        let text = text.into();
        let expansions = expander.map(|e| e.expand(&text)).unwrap_or_default();
        Self { text, expansions }
    }

    /// The query first, then each distinct expansion.
    pub fn variants(&self) -> Vec<&str> {
        let mut variants = vec![self.text.as_str()];
        for expansion in &self.expansions {
            if !variants.contains(&expansion.as_str()) {
                variants.push(expansion);
            }
        }
        variants
    }
}
