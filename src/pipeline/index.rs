//! Swappable, read-only search index.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::lexical::{Bm25Index, Bm25Params};
use crate::store::ChunkStore;

/// A chunk store plus the BM25 index built over it. Never mutated after construction.
#[derive(Debug)]
pub struct SearchIndex {
    store: Arc<ChunkStore>,
    bm25: Arc<Bm25Index>,
}

impl SearchIndex {
    pub fn new(store: ChunkStore, params: Bm25Params) -> Self {
        let bm25 = Bm25Index::build(&store, params);
        Self {
            store: Arc::new(store),
            bm25: Arc::new(bm25),
        }
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn bm25(&self) -> &Arc<Bm25Index> {
        &self.bm25
    }
}

/// Holds the live [`SearchIndex`].
///
/// Queries take a snapshot with [`current`](Self::current) and keep using it even if a
/// re-index swaps in a new one mid-query.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<SearchIndex>>,
}

impl IndexHandle {
    pub fn new(index: SearchIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn current(&self) -> Arc<SearchIndex> {
        Arc::clone(&self.current.read())
    }

    /// Installs `index` and returns the one it replaced.
    pub fn replace(&self, index: SearchIndex) -> Arc<SearchIndex> {
        std::mem::replace(&mut *self.current.write(), Arc::new(index))
    }
}
