//! In-memory cache of active retrievers.

use crate::lifecycle::PdfRetriever;
use crate::vector::IndexId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache of resolved retrievers, keyed by index id.
///
/// Owned by the lifecycle manager; entries are inserted after a successful
/// build or resolve and removed on delete. Contents are never persisted,
/// a restart starts cold.
#[derive(Default)]
pub struct ActiveIndexCache {
    entries: RwLock<HashMap<IndexId, Arc<PdfRetriever>>>,
}

impl ActiveIndexCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &IndexId) -> Option<Arc<PdfRetriever>> {
        self.entries.read().get(id).cloned()
    }

    pub fn insert(&self, id: IndexId, retriever: Arc<PdfRetriever>) {
        self.entries.write().insert(id, retriever);
    }

    /// Remove an entry, returning whether it was present.
    pub fn remove(&self, id: &IndexId) -> bool {
        self.entries.write().remove(id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: &IndexId) -> bool {
        self.entries.read().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
