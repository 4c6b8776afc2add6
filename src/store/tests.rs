use super::*;
use crate::chunk::{ChunkKind, SourceLocation};
use crate::embedding::BertEmbedder;
use crate::embedding::mock::FixedEmbedder;

fn symbol_chunk(id: &str, kind: &str, symbol: &str, path: &str) -> ChunkInput {
    let signature = format!("pub {kind} {symbol}");
    let kind = match kind {
        "fn" => ChunkKind::Function {
            symbol: symbol.to_string(),
            signature: signature.clone(),
        },
        "struct" => ChunkKind::Struct {
            symbol: symbol.to_string(),
            signature: signature.clone(),
        },
        _ => ChunkKind::Enum {
            symbol: symbol.to_string(),
            signature: signature.clone(),
        },
    };
    ChunkInput {
        id: ChunkId::new(id),
        text: format!("{signature} {{}}"),
        kind,
        doc: None,
        location: SourceLocation::new(path, 1, 3),
    }
}

fn corpus() -> Vec<ChunkInput> {
    vec![
        symbol_chunk("auth::login", "fn", "login", "src/auth.rs"),
        symbol_chunk("auth::Session", "struct", "Session", "src/auth.rs"),
        symbol_chunk("db::Backend", "enum", "Backend", "src/db.rs"),
        symbol_chunk("db::connect", "fn", "connect", "src/db.rs"),
    ]
}

fn no_extras() -> IndexPolicy {
    IndexPolicy {
        index_type_chunks: true,
        use_file_summary_chunks: false,
    }
}

#[test]
fn test_build_keeps_corpus_order() {
    let store = ChunkStore::build(corpus(), &BertEmbedder::stub(16).unwrap(), no_extras()).unwrap();
    let ids: Vec<_> = store.ids().map(ChunkId::as_str).collect();
    assert_eq!(
        ids,
        vec!["auth::login", "auth::Session", "db::Backend", "db::connect"]
    );
    assert_eq!(store.embedding_dim(), 16);
    assert!(store.iter().all(|r| r.embedding().len() == 16));
}

#[test]
fn test_build_drops_type_chunks_when_disabled() {
    let policy = IndexPolicy {
        index_type_chunks: false,
        use_file_summary_chunks: false,
    };
    let store = ChunkStore::build(corpus(), &BertEmbedder::stub(8).unwrap(), policy).unwrap();
    let ids: Vec<_> = store.ids().map(ChunkId::as_str).collect();
    assert_eq!(ids, vec!["auth::login", "db::connect"]);
}

#[test]
fn test_build_appends_file_summaries() {
    let store = ChunkStore::build(corpus(), &BertEmbedder::stub(8).unwrap(), IndexPolicy::default()).unwrap();
    assert_eq!(store.len(), 6);

    let summary = store.get(&ChunkId::new("file:src/auth.rs")).unwrap();
    assert_eq!(summary.kind().tag(), KindTag::FileSummary);
    assert!(summary.text().contains("login"));
    assert!(summary.text().contains("Session"));
}

#[test]
fn test_build_rejects_duplicate_ids() {
    let mut inputs = corpus();
    inputs.push(symbol_chunk("auth::login", "fn", "login_again", "src/auth.rs"));

    let err = ChunkStore::build(inputs, &BertEmbedder::stub(8).unwrap(), no_extras()).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId { id } if id.as_str() == "auth::login"));
}

#[test]
fn test_build_rejects_wrong_length_embeddings() {
    let embedder = FixedEmbedder::new(4).with_vector("pub fn connect {}", vec![1.0, 0.0]);
    let err = ChunkStore::build(corpus(), &embedder, no_extras()).unwrap_err();
    match err {
        StoreError::DimensionMismatch {
            id,
            expected,
            actual,
        } => {
            assert_eq!(id.as_str(), "db::connect");
            assert_eq!(expected, 4);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        StoreError::DimensionMismatch {
            id: ChunkId::new("x"),
            expected: 1,
            actual: 2
        }
        .is_config_error()
    );
}

#[test]
fn test_empty_corpus_builds_empty_store() {
    let store = ChunkStore::build(Vec::new(), &BertEmbedder::stub(8).unwrap(), IndexPolicy::default())
        .unwrap();
    assert!(store.is_empty());
    assert_eq!(store.ids().count(), 0);
}

#[test]
fn test_get_missing_is_not_found() {
    let store = ChunkStore::build(corpus(), &BertEmbedder::stub(8).unwrap(), no_extras()).unwrap();
    let missing = ChunkId::new("nope");
    assert!(matches!(store.get(&missing), Err(StoreError::NotFound { .. })));
    assert!(store.lookup(&missing).is_none());
    assert!(!store.contains(&missing));
    assert!(store.contains(&ChunkId::new("db::connect")));
}

#[test]
fn test_check_embedder() {
    let embedder = BertEmbedder::stub(8).unwrap();
    let store = ChunkStore::build(corpus(), &embedder, no_extras()).unwrap();

    assert!(store.check_embedder(&embedder).is_ok());

    let other_dim = BertEmbedder::stub(16).unwrap();
    let err = store.check_embedder(&other_dim).unwrap_err();
    assert!(err.is_config_error());

    let other_model = FixedEmbedder::new(8).with_model_id("someone-else");
    assert!(matches!(
        store.check_embedder(&other_model),
        Err(StoreError::EmbedderMismatch { .. })
    ));
}

#[test]
fn test_fingerprint_tracks_content() {
    let embedder = BertEmbedder::stub(8).unwrap();
    let a = ChunkStore::build(corpus(), &embedder, no_extras()).unwrap();
    let b = ChunkStore::build(corpus(), &embedder, no_extras()).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let mut changed = corpus();
    changed[0].text.push_str(" // edited");
    let c = ChunkStore::build(changed, &embedder, no_extras()).unwrap();
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn test_snapshot_preserves_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("index.rkyv");

    let mut inputs = corpus();
    inputs[0].doc = Some("Logs a user in.".to_string());
    let store = ChunkStore::build(inputs, &BertEmbedder::stub(8).unwrap(), IndexPolicy::default()).unwrap();

    store.save(&path).unwrap();
    let loaded = ChunkStore::load(&path).unwrap();

    assert_eq!(loaded.records(), store.records());
    assert_eq!(loaded.model_id(), store.model_id());
    assert_eq!(loaded.embedding_dim(), 8);
    assert_eq!(loaded.fingerprint(), store.fingerprint());
    assert_eq!(
        loaded
            .get(&ChunkId::new("auth::login"))
            .unwrap()
            .doc(),
        Some("Logs a user in.")
    );
}

#[test]
fn test_snapshot_overwrite_replaces_previous() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.rkyv");
    let embedder = BertEmbedder::stub(8).unwrap();

    ChunkStore::build(corpus(), &embedder, no_extras())
        .unwrap()
        .save(&path)
        .unwrap();
    let smaller = ChunkStore::build(corpus()[..1].to_vec(), &embedder, no_extras()).unwrap();
    smaller.save(&path).unwrap();

    assert_eq!(ChunkStore::load(&path).unwrap().len(), 1);
}

#[test]
fn test_load_missing_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let err = ChunkStore::load(&dir.path().join("absent.rkyv")).unwrap_err();
    assert!(matches!(err, StoreError::SnapshotNotFound { .. }));
}

#[test]
fn test_load_garbage_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.rkyv");
    std::fs::write(&path, b"definitely not an rkyv archive").unwrap();

    let err = ChunkStore::load(&path).unwrap_err();
    assert!(err.is_config_error(), "got {err}");
}

/// Drops the last vector of every batch it embeds.
struct ShortBatchEmbedder(FixedEmbedder);

impl Embedder for ShortBatchEmbedder {
    fn model_id(&self) -> &str {
        self.0.model_id()
    }

    fn embedding_dim(&self) -> usize {
        self.0.embedding_dim()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, crate::embedding::EmbeddingError> {
        self.0.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, crate::embedding::EmbeddingError> {
        let mut vectors = self.0.embed_batch(texts)?;
        vectors.pop();
        Ok(vectors)
    }
}

#[test]
fn test_build_rejects_short_embedding_batch() {
    let embedder = ShortBatchEmbedder(FixedEmbedder::new(4));
    let err = ChunkStore::build(corpus(), &embedder, no_extras()).unwrap_err();
    match &err {
        StoreError::EmbeddingCountMismatch {
            first,
            expected,
            actual,
        } => {
            assert_eq!(first.as_str(), "auth::login");
            assert_eq!(*expected, 4);
            assert_eq!(*actual, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_config_error());
}
