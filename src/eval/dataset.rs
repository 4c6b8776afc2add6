//! Labelled question sets.
//!
//! ```json
//! { "questions": [
//!     { "query": "where are JWTs validated?", "chunk_id": "src/auth.rs::validate_jwt" },
//!     { "question": "where is the billing module?", "exists": false }
//! ] }
//! ```
//!
//! `question` is accepted as an alias for `query`. A question without `chunk_id`, or with
//! `exists: false` or `deleted: true`, expects the "no answer" outcome.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{EvalError, EvalResult};
use crate::chunk::ChunkId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GroundTruth {
    Chunk(ChunkId),
    NoAnswer,
}

impl GroundTruth {
    pub fn chunk_id(&self) -> Option<&ChunkId> {
        match self {
            Self::Chunk(id) => Some(id),
            Self::NoAnswer => None,
        }
    }

    pub fn is_no_answer(&self) -> bool {
        matches!(self, Self::NoAnswer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationCase {
    pub query: String,
    pub truth: GroundTruth,
}

impl EvaluationCase {
    pub fn answerable(query: impl Into<String>, chunk_id: impl Into<ChunkId>) -> Self {
        Self {
            query: query.into(),
            truth: GroundTruth::Chunk(chunk_id.into()),
        }
    }

    pub fn unanswerable(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            truth: GroundTruth::NoAnswer,
        }
    }
}

#[derive(Deserialize)]
struct RawDataset {
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(alias = "question")]
    query: String,
    #[serde(default)]
    chunk_id: Option<String>,
    #[serde(default)]
    exists: Option<bool>,
    #[serde(default)]
    deleted: Option<bool>,
}

impl RawQuestion {
    fn into_case(self, index: usize) -> EvalResult<EvaluationCase> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            return Err(EvalError::EmptyQuery { index });
        }

        let absent = self.exists == Some(false) || self.deleted == Some(true);
        let truth = match self.chunk_id {
            Some(id) if !absent && !id.trim().is_empty() => GroundTruth::Chunk(ChunkId::new(id)),
            _ => GroundTruth::NoAnswer,
        };
        Ok(EvaluationCase { query, truth })
    }
}

/// Parses a dataset document. Question order is preserved.
pub fn parse_dataset(json: &str) -> EvalResult<Vec<EvaluationCase>> {
    let raw: RawDataset = serde_json::from_str(json)?;
    raw.questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| question.into_case(index))
        .collect()
}

pub fn load_dataset(path: &Path) -> EvalResult<Vec<EvaluationCase>> {
    let json = std::fs::read_to_string(path).map_err(|source| EvalError::ReadDataset {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dataset(&json)
}
