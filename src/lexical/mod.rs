//! Lexical scoring (BM25 Okapi).
//!
//! Index and query text share [`tokenize`]: lowercase runs of word characters. Each chunk is
//! indexed as `symbol doc text` so that a query naming a function finds it even when the body
//! never repeats the name.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use tracing::debug;

use crate::chunk::ChunkId;
use crate::constants::{BM25_IDF_EPSILON, DEFAULT_BM25_B, DEFAULT_BM25_K1};
use crate::scoring::{ScoredCandidate, sanitize_score};
use crate::store::ChunkStore;

/// Lowercased runs of alphanumeric characters and underscores.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Length normalization strength in `[0, 1]`.
    pub b: f32,
    /// Negative IDFs are replaced by `epsilon * mean(idf)`.
    pub epsilon: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_BM25_K1,
            b: DEFAULT_BM25_B,
            epsilon: BM25_IDF_EPSILON,
        }
    }
}

impl Bm25Params {
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            ..Default::default()
        }
    }
}

/// Inverted index over the chunk corpus with precomputed IDF.
///
/// Built once per [`ChunkStore`]; scoring never mutates it.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    ids: Vec<ChunkId>,
    doc_lens: Vec<u32>,
    avgdl: f32,
    /// term -> [(document position, term frequency)]
    postings: HashMap<String, Vec<(u32, u32)>>,
    idf: HashMap<String, f32>,
    params: Bm25Params,
}

impl Bm25Index {
    /// Indexes every chunk in `store` by its lexical text.
    pub fn build(store: &ChunkStore, params: Bm25Params) -> Self {
        Self::from_documents(
            store
                .iter()
                .map(|record| (record.id().clone(), record.lexical_text())),
            params,
        )
    }

    pub fn from_documents<I>(documents: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = (ChunkId, String)>,
    {
        let mut ids = Vec::new();
        let mut doc_lens = Vec::new();
        let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();

        for (position, (id, text)) in documents.into_iter().enumerate() {
            let tokens = tokenize(&text);
            doc_lens.push(tokens.len() as u32);
            ids.push(id);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_default() += 1;
            }
            for (term, count) in tf {
                postings
                    .entry(term)
                    .or_default()
                    .push((position as u32, count));
            }
        }

        let total_len: u64 = doc_lens.iter().map(|&l| u64::from(l)).sum();
        let avgdl = if ids.is_empty() {
            0.0
        } else {
            total_len as f32 / ids.len() as f32
        };

        let idf = compute_idf(ids.len(), &postings, params.epsilon);

        debug!(
            documents = ids.len(),
            vocabulary = postings.len(),
            avgdl,
            "Built BM25 index"
        );

        Self {
            ids,
            doc_lens,
            avgdl,
            postings,
            idf,
            params,
        }
    }

    /// BM25 score of every indexed chunk against `query`, in corpus order.
    ///
    /// Chunks sharing no term with the query score `0.0`; an empty query scores everything
    /// `0.0`. Repeated query terms count once per occurrence.
    pub fn score(&self, query: &str) -> Vec<ScoredCandidate> {
        let mut scores = vec![0.0f32; self.ids.len()];
        let Bm25Params { k1, b, .. } = self.params;

        for term in tokenize(query) {
            let (Some(postings), Some(&idf)) = (self.postings.get(&term), self.idf.get(&term))
            else {
                continue;
            };
            for &(position, tf) in postings {
                let tf = tf as f32;
                let dl = self.doc_lens[position as usize] as f32;
                let length_norm = if self.avgdl > 0.0 {
                    1.0 - b + b * dl / self.avgdl
                } else {
                    1.0
                };
                scores[position as usize] += idf * tf * (k1 + 1.0) / (tf + k1 * length_norm);
            }
        }

        self.ids
            .iter()
            .zip(scores)
            .map(|(id, score)| ScoredCandidate::new(id.clone(), sanitize_score(score)))
            .collect()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.idf.get(term).copied()
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Okapi IDF `ln((N - df + 0.5) / (df + 0.5))`. Terms in more than half the corpus would go
/// negative; they get `epsilon * mean(idf)` instead (never below zero).
///
/// The mean is accumulated in `f64` over terms in sorted order so the floor is bit-identical
/// across builds of the same corpus.
fn compute_idf(
    corpus_size: usize,
    postings: &HashMap<String, Vec<(u32, u32)>>,
    epsilon: f32,
) -> HashMap<String, f32> {
    let n = corpus_size as f64;
    let mut terms: Vec<(&String, usize)> = postings
        .iter()
        .map(|(term, docs)| (term, docs.len()))
        .collect();
    terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut idf = HashMap::with_capacity(terms.len());
    let mut idf_sum = 0.0f64;
    let mut negative = Vec::new();

    for (term, df) in terms {
        let df = df as f64;
        let value = (n - df + 0.5).ln() - (df + 0.5).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value as f32);
    }

    if !postings.is_empty() {
        let floor = (f64::from(epsilon) * idf_sum / postings.len() as f64).max(0.0) as f32;
        for term in negative {
            idf.insert(term, floor);
        }
    }

    idf
}
