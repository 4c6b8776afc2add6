//! On-disk index snapshot.
//!
//! One rkyv archive per index: header (format version, model id, dimension, fingerprint)
//! followed by every chunk with its f16 embedding as little-endian bytes. Writes go to a temp
//! file in the target directory and are renamed into place; reads map the file and validate it
//! before deserializing.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use half::f16;
use memmap2::Mmap;
use rkyv::rancor::Error as RkyvError;
use rkyv::{Archive, Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{ChunkStore, StoreError};
use crate::chunk::{ChunkId, ChunkKind, ChunkRecord, SourceLocation};

/// Bumped whenever [`Snapshot`]'s layout changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const KIND_FUNCTION: u8 = 0;
const KIND_STRUCT: u8 = 1;
const KIND_ENUM: u8 = 2;
const KIND_FILE_SUMMARY: u8 = 3;

#[derive(Archive, Serialize, Deserialize, Debug)]
struct Snapshot {
    format_version: u32,
    model_id: String,
    embedding_dim: u32,
    fingerprint: String,
    chunks: Vec<StoredChunk>,
}

#[derive(Archive, Serialize, Deserialize, Debug)]
struct StoredChunk {
    id: String,
    text: String,
    kind: u8,
    /// Symbol for symbol kinds, file path for summaries.
    name: String,
    signature: String,
    doc: Option<String>,
    path: String,
    start_line: u32,
    end_line: u32,
    embedding: Vec<u8>,
}

impl StoredChunk {
    fn from_record(record: &ChunkRecord) -> Self {
        let (kind, name, signature) = match record.kind() {
            ChunkKind::Function { symbol, signature } => {
                (KIND_FUNCTION, symbol.clone(), signature.clone())
            }
            ChunkKind::Struct { symbol, signature } => {
                (KIND_STRUCT, symbol.clone(), signature.clone())
            }
            ChunkKind::Enum { symbol, signature } => (KIND_ENUM, symbol.clone(), signature.clone()),
            ChunkKind::FileSummary { file } => (KIND_FILE_SUMMARY, file.clone(), String::new()),
        };

        let location = record.location();
        Self {
            id: record.id().as_str().to_string(),
            text: record.text().to_string(),
            kind,
            name,
            signature,
            doc: record.doc().map(str::to_string),
            path: location.path.clone(),
            start_line: location.start_line,
            end_line: location.end_line,
            embedding: record
                .embedding()
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect(),
        }
    }

    fn into_record(self) -> Result<ChunkRecord, StoreError> {
        let kind = match self.kind {
            KIND_FUNCTION => ChunkKind::Function {
                symbol: self.name,
                signature: self.signature,
            },
            KIND_STRUCT => ChunkKind::Struct {
                symbol: self.name,
                signature: self.signature,
            },
            KIND_ENUM => ChunkKind::Enum {
                symbol: self.name,
                signature: self.signature,
            },
            KIND_FILE_SUMMARY => ChunkKind::FileSummary { file: self.name },
            other => {
                return Err(StoreError::Corrupt {
                    reason: format!("chunk {} has unknown kind tag {other}", self.id),
                });
            }
        };

        if self.embedding.len() % 2 != 0 {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "chunk {} embedding has odd byte length {}",
                    self.id,
                    self.embedding.len()
                ),
            });
        }
        let embedding = self
            .embedding
            .chunks_exact(2)
            .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(ChunkRecord::from_stored(
            ChunkId::new(self.id),
            self.text,
            kind,
            self.doc,
            SourceLocation::new(self.path, self.start_line, self.end_line),
            embedding,
        ))
    }
}

impl ChunkStore {
    /// Writes the store to `path`, replacing any existing snapshot atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            model_id: self.model_id.clone(),
            embedding_dim: self.embedding_dim as u32,
            fingerprint: self.fingerprint.clone(),
            chunks: self.records.iter().map(StoredChunk::from_record).collect(),
        };

        let bytes = rkyv::to_bytes::<RkyvError>(&snapshot)
            .map_err(|e| StoreError::Serialization(format!("{:?}", e)))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        info!(
            path = %path.display(),
            chunks = self.len(),
            bytes = bytes.len(),
            "Saved index snapshot"
        );
        Ok(())
    }

    /// Maps `path` and rebuilds the store it contains.
    ///
    /// The fingerprint is recomputed from the loaded chunks and must match the one recorded at
    /// save time.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::SnapshotNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path)?;
        // SAFETY: the snapshot is only ever replaced by rename, never written in place.
        let mmap = unsafe { Mmap::map(&file)? };

        let archived = rkyv::access::<ArchivedSnapshot, RkyvError>(&mmap[..]).map_err(|e| {
            StoreError::Corrupt {
                reason: format!("{:?}", e),
            }
        })?;

        let found = archived.format_version.to_native();
        if found != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let snapshot = rkyv::deserialize::<Snapshot, RkyvError>(archived).map_err(|e| {
            StoreError::Corrupt {
                reason: format!("{:?}", e),
            }
        })?;

        debug!(
            path = %path.display(),
            chunks = snapshot.chunks.len(),
            "Mapped index snapshot"
        );

        let records = snapshot
            .chunks
            .into_iter()
            .map(StoredChunk::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        let store = Self::from_records(
            records,
            snapshot.model_id,
            snapshot.embedding_dim as usize,
        )?;

        if store.fingerprint != snapshot.fingerprint {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "fingerprint mismatch: recorded {}, computed {}",
                    snapshot.fingerprint, store.fingerprint
                ),
            });
        }

        info!(
            path = %path.display(),
            chunks = store.len(),
            model_id = %store.model_id,
            "Loaded index snapshot"
        );
        Ok(store)
    }
}
