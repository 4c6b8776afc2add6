//! Chunk store.
//!
//! Owns every indexed [`ChunkRecord`] in corpus order. Built once (from chunker output plus an
//! [`Embedder`]) or loaded from a snapshot, then read-only: all scorers see the same chunk set
//! and the same embeddings.

pub mod error;
mod snapshot;

#[cfg(test)]
mod tests;

pub use error::StoreError;
pub use snapshot::SNAPSHOT_FORMAT_VERSION;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::chunk::{ChunkId, ChunkInput, ChunkRecord, KindTag, synthesize_file_summaries};
use crate::config::PipelineConfig;
use crate::embedding::Embedder;
use crate::hashing::IndexFingerprint;

const EMBED_BATCH_SIZE: usize = 32;

/// Which chunk kinds make it into the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPolicy {
    /// Keep struct and enum chunks.
    pub index_type_chunks: bool,
    /// Synthesize per-file summary chunks (and keep summaries supplied by the chunker).
    pub use_file_summary_chunks: bool,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            index_type_chunks: true,
            use_file_summary_chunks: true,
        }
    }
}

impl From<&PipelineConfig> for IndexPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            index_type_chunks: config.index_type_chunks,
            use_file_summary_chunks: config.use_file_summary_chunks,
        }
    }
}

impl IndexPolicy {
    fn admits(&self, tag: KindTag) -> bool {
        match tag {
            KindTag::Function => true,
            KindTag::Struct | KindTag::Enum => self.index_type_chunks,
            KindTag::FileSummary => self.use_file_summary_chunks,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkStore {
    records: Vec<ChunkRecord>,
    positions: HashMap<ChunkId, usize>,
    model_id: String,
    embedding_dim: usize,
    fingerprint: String,
}

impl ChunkStore {
    /// Filters `inputs` by `policy`, adds file summaries, embeds everything and indexes it.
    ///
    /// Fails on duplicate ids and on any embedding whose length differs from
    /// `embedder.embedding_dim()`.
    pub fn build(
        inputs: Vec<ChunkInput>,
        embedder: &dyn Embedder,
        policy: IndexPolicy,
    ) -> Result<Self, StoreError> {
        let received = inputs.len();
        let mut admitted: Vec<ChunkInput> = inputs
            .into_iter()
            .filter(|input| policy.admits(input.kind.tag()))
            .collect();

        if policy.use_file_summary_chunks {
            let supplied: HashSet<ChunkId> = admitted
                .iter()
                .filter(|input| input.kind.tag() == KindTag::FileSummary)
                .map(|input| input.id.clone())
                .collect();
            let summaries: Vec<ChunkInput> = synthesize_file_summaries(&admitted)
                .into_iter()
                .filter(|summary| !supplied.contains(&summary.id))
                .collect();
            admitted.extend(summaries);
        }

        let embedding_dim = embedder.embedding_dim();
        let mut records = Vec::with_capacity(admitted.len());
        let mut batch: Vec<ChunkInput> = Vec::with_capacity(EMBED_BATCH_SIZE);

        for input in admitted {
            batch.push(input);
            if batch.len() == EMBED_BATCH_SIZE {
                embed_batch_into(&mut batch, embedder, embedding_dim, &mut records)?;
            }
        }
        embed_batch_into(&mut batch, embedder, embedding_dim, &mut records)?;

        let store = Self::from_records(records, embedder.model_id().to_string(), embedding_dim)?;

        info!(
            received,
            indexed = store.len(),
            model_id = %store.model_id,
            embedding_dim,
            fingerprint = %store.fingerprint,
            "Built chunk store"
        );

        Ok(store)
    }

    pub(crate) fn from_records(
        records: Vec<ChunkRecord>,
        model_id: String,
        embedding_dim: usize,
    ) -> Result<Self, StoreError> {
        let mut positions = HashMap::with_capacity(records.len());
        let mut fingerprint = IndexFingerprint::new(&model_id, embedding_dim);

        for (position, record) in records.iter().enumerate() {
            if record.embedding().len() != embedding_dim {
                return Err(StoreError::DimensionMismatch {
                    id: record.id().clone(),
                    expected: embedding_dim,
                    actual: record.embedding().len(),
                });
            }
            if positions.insert(record.id().clone(), position).is_some() {
                return Err(StoreError::DuplicateId {
                    id: record.id().clone(),
                });
            }
            fingerprint.add_chunk(record.id().as_str(), record.text());
        }

        Ok(Self {
            records,
            positions,
            model_id,
            embedding_dim,
            fingerprint: fingerprint.finish(),
        })
    }

    /// Point lookup.
    pub fn get(&self, id: &ChunkId) -> Result<&ChunkRecord, StoreError> {
        self.lookup(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    pub fn lookup(&self, id: &ChunkId) -> Option<&ChunkRecord> {
        self.positions.get(id).map(|&p| &self.records[p])
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.positions.contains_key(id)
    }

    /// All chunk ids, in corpus order.
    pub fn ids(&self) -> impl Iterator<Item = &ChunkId> {
        self.records.iter().map(ChunkRecord::id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChunkRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// BLAKE3 over model id, dimension and every `(id, text)` in order.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Verifies that `embedder` produced this index.
    pub fn check_embedder(&self, embedder: &dyn Embedder) -> Result<(), StoreError> {
        if embedder.model_id() != self.model_id || embedder.embedding_dim() != self.embedding_dim {
            return Err(StoreError::EmbedderMismatch {
                index_model: self.model_id.clone(),
                index_dim: self.embedding_dim,
                embedder_model: embedder.model_id().to_string(),
                embedder_dim: embedder.embedding_dim(),
            });
        }
        Ok(())
    }
}

fn embed_batch_into(
    batch: &mut Vec<ChunkInput>,
    embedder: &dyn Embedder,
    embedding_dim: usize,
    records: &mut Vec<ChunkRecord>,
) -> Result<(), StoreError> {
    if batch.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = batch.iter().map(ChunkInput::embedding_text).collect();
    let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let embeddings = embedder.embed_batch(&text_refs)?;

    if embeddings.len() != batch.len() {
        return Err(StoreError::EmbeddingCountMismatch {
            first: batch[0].id.clone(),
            expected: batch.len(),
            actual: embeddings.len(),
        });
    }

    debug!(batch = batch.len(), "Embedded chunk batch");

    for (input, embedding) in batch.drain(..).zip(embeddings) {
        if embedding.len() != embedding_dim {
            return Err(StoreError::DimensionMismatch {
                id: input.id,
                expected: embedding_dim,
                actual: embedding.len(),
            });
        }
        records.push(ChunkRecord::new(input, &embedding));
    }
    Ok(())
}
