//! Per-document index lifecycle management.
//!
//! Every uploaded PDF becomes one immutable vector index identified by a
//! UUID. This module owns the full lifecycle: admission, build, persistence,
//! resolution through an ordered list of sources, caching, and deletion.
//!
//! Resolution order is a policy, not an accident: the in-memory cache is
//! consulted first (no I/O), then each configured blob store in order. The
//! first store is the primary and receives all writes; later stores are
//! read-only fallbacks for when the primary is unreachable.

pub mod cache;

use crate::document::{self, Chunk};
use crate::error::{AssistError, AssistResult};
use crate::store::{BlobStore, StoreError, keys};
use crate::vector::{EmbeddingProvider, IndexId, ScoredChunk, VectorIndex};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use cache::ActiveIndexCache;

/// Catalog record persisted alongside every index as `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: IndexId,
    pub filename: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
}

/// A resolved index ready to answer similarity queries.
pub struct PdfRetriever {
    index: Arc<VectorIndex>,
    record: IndexRecord,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl PdfRetriever {
    #[must_use]
    pub fn record(&self) -> &IndexRecord {
        &self.record
    }

    /// Retrieve the `k` most relevant chunks for a question.
    ///
    /// Query embedding is CPU-bound, so the search runs on the blocking pool.
    pub async fn retrieve(&self, question: &str, k: usize) -> AssistResult<Vec<ScoredChunk>> {
        let index = Arc::clone(&self.index);
        let embedder = Arc::clone(&self.embedder);
        let question = question.to_string();

        let hits = tokio::task::spawn_blocking(move || index.search(&question, k, embedder.as_ref()))
            .await
            .map_err(|e| AssistError::General(format!("Search task failed: {e}")))??;
        Ok(hits)
    }
}

/// Manages the build/persist/resolve/delete lifecycle of per-document
/// vector indexes.
pub struct IndexLifecycleManager {
    sources: Vec<Arc<dyn BlobStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: ActiveIndexCache,
    inflight: DashMap<IndexId, Arc<tokio::sync::Mutex<()>>>,
    /// Serializes admission with registration: the capacity check and the
    /// persist it authorizes must not interleave across uploads.
    admission: tokio::sync::Mutex<()>,
    max_active: usize,
}

impl IndexLifecycleManager {
    /// Create a manager over an ordered list of blob sources.
    ///
    /// `sources` must be non-empty; the first entry is the primary store and
    /// receives all writes.
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn BlobStore>>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_active: usize,
    ) -> Self {
        assert!(!sources.is_empty(), "at least one blob source is required");
        Self {
            sources,
            embedder,
            cache: ActiveIndexCache::new(),
            inflight: DashMap::new(),
            admission: tokio::sync::Mutex::new(()),
            max_active,
        }
    }

    fn primary(&self) -> &Arc<dyn BlobStore> {
        &self.sources[0]
    }

    #[must_use]
    pub fn cache(&self) -> &ActiveIndexCache {
        &self.cache
    }

    /// Probe each source's container once, logging what is reachable.
    /// A missing or unreachable container is not fatal; resolution falls
    /// through to the next source at request time.
    pub async fn probe_sources(&self) {
        for source in &self.sources {
            match source.container_exists().await {
                Ok(true) => info!(source = source.name(), "blob source ready"),
                Ok(false) => warn!(source = source.name(), "container not provisioned"),
                Err(e) => warn!(source = source.name(), error = %e, "blob source unreachable"),
            }
        }
    }

    /// List catalog records from the first source that answers.
    async fn list_keys(&self, prefix: &str) -> AssistResult<Vec<String>> {
        let mut last_err: Option<StoreError> = None;
        for source in &self.sources {
            match source.list(prefix).await {
                Ok(list) => return Ok(list),
                Err(StoreError::Unavailable(reason)) => {
                    warn!(source = source.name(), %reason, "source unavailable for list");
                    last_err = Some(StoreError::Unavailable(reason));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err
            .unwrap_or_else(|| StoreError::Unavailable("No sources configured".to_string()))
            .into())
    }

    /// Count persisted user-owned indexes.
    ///
    /// Counts catalog records in the store rather than cache entries, so the
    /// limit holds across restarts and bounds remote growth.
    pub async fn active_count(&self) -> AssistResult<usize> {
        let records = self.list().await?;
        Ok(records.len())
    }

    /// Capacity guard for new uploads.
    async fn admit_new_upload(&self) -> AssistResult<()> {
        let active = self.active_count().await?;
        if active >= self.max_active {
            return Err(AssistError::CapacityExceeded {
                active,
                limit: self.max_active,
            });
        }
        Ok(())
    }

    /// Register a new uploaded document: extract, chunk, build, persist,
    /// cache. Returns the catalog record.
    ///
    /// All-or-nothing: any failure after artifacts were written removes them
    /// again, so no partial record survives.
    ///
    /// Registrations run one at a time under the admission lock. Two uploads
    /// racing for the last free slot would otherwise both pass the capacity
    /// check before either writes its record.
    pub async fn register_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> AssistResult<IndexRecord> {
        let _admission = self.admission.lock().await;
        self.admit_new_upload().await?;

        let id = IndexId::generate();
        info!(%id, filename, size = bytes.len(), "registering document");

        let extracted = document::extract_text(bytes.clone()).await?;
        let page_count = extracted.page_count();
        let chunks = document::chunk_document(&extracted)?;

        let index = self.build_index(chunks).await?;
        let record = IndexRecord {
            id: id.clone(),
            filename: filename.to_string(),
            page_count,
            chunk_count: index.len(),
            dimension: index.dimension().get(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.persist(&record, &index, filename, bytes).await {
            warn!(%id, error = %e, "persist failed, rolling back artifacts");
            self.rollback(&id).await;
            return Err(e);
        }

        self.cache.insert(
            id.clone(),
            Arc::new(PdfRetriever {
                index: Arc::new(index),
                record: record.clone(),
                embedder: Arc::clone(&self.embedder),
            }),
        );

        info!(%id, chunks = record.chunk_count, pages = record.page_count, "index built and persisted");
        Ok(record)
    }

    /// Embed all chunks and assemble the index on the blocking pool.
    async fn build_index(&self, chunks: Vec<Chunk>) -> AssistResult<VectorIndex> {
        let embedder = Arc::clone(&self.embedder);
        let index = tokio::task::spawn_blocking(move || VectorIndex::build(chunks, embedder.as_ref()))
            .await
            .map_err(|e| AssistError::General(format!("Index build task failed: {e}")))??;
        Ok(index)
    }

    async fn persist(
        &self,
        record: &IndexRecord,
        index: &VectorIndex,
        filename: &str,
        source_bytes: Vec<u8>,
    ) -> AssistResult<()> {
        let index_bytes = index.to_bytes()?;
        let record_bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| AssistError::General(format!("Failed to encode catalog record: {e}")))?;

        let store = self.primary();
        store.put(&keys::index_bin(&record.id), index_bytes).await?;
        store
            .put(&keys::index_json(&record.id), record_bytes)
            .await?;
        store
            .put(&keys::source_document(&record.id, filename), source_bytes)
            .await?;
        Ok(())
    }

    /// Best-effort removal of everything under the id prefix after a failed
    /// registration. Leftovers are logged, never surfaced.
    async fn rollback(&self, id: &IndexId) {
        let store = self.primary();
        let prefix = keys::id_prefix(id);
        match store.list(&prefix).await {
            Ok(leftover_keys) => {
                for key in leftover_keys {
                    if let Err(e) = store.delete(&key).await {
                        warn!(%id, key, error = %e, "rollback delete failed");
                    }
                }
            }
            Err(e) => warn!(%id, error = %e, "rollback listing failed"),
        }
        self.cache.remove(id);
    }

    /// Resolve an id to a ready retriever.
    ///
    /// Strategy order: cache, then each blob source. Concurrent calls for
    /// the same unresolved id serialize behind a per-id mutex, so exactly
    /// one download and decode happens; waiters find the cache warm.
    pub async fn resolve(&self, id: &IndexId) -> AssistResult<Arc<PdfRetriever>> {
        if let Some(retriever) = self.cache.get(id) {
            return Ok(retriever);
        }

        let lock = self.lock_id(id);
        let _guard = lock.lock().await;

        // A concurrent resolver may have filled the cache while we waited
        if let Some(retriever) = self.cache.get(id) {
            return Ok(retriever);
        }

        // Drop the map entry on failure too, or every miss (e.g. probing a
        // random id) would leave a mutex behind forever
        let result = self.resolve_from_sources(id).await;
        self.inflight.remove(id);

        let retriever = result?;
        self.cache.insert(id.clone(), Arc::clone(&retriever));
        Ok(retriever)
    }

    fn lock_id(&self, id: &IndexId) -> Arc<tokio::sync::Mutex<()>> {
        self.inflight
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Number of ids with an in-flight resolve or delete.
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.inflight.len()
    }

    async fn resolve_from_sources(&self, id: &IndexId) -> AssistResult<Arc<PdfRetriever>> {
        for source in &self.sources {
            match self.fetch_index(source, id).await {
                Ok(retriever) => {
                    info!(%id, source = source.name(), "index resolved from store");
                    return Ok(retriever);
                }
                Err(AssistError::Store(StoreError::NotFound(_))) => {
                    debug!(%id, source = source.name(), "index not in source");
                }
                Err(AssistError::Store(StoreError::Unavailable(reason))) => {
                    warn!(%id, source = source.name(), %reason, "source unavailable, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Err(AssistError::IndexNotFound { id: id.clone() })
    }

    async fn fetch_index(
        &self,
        source: &Arc<dyn BlobStore>,
        id: &IndexId,
    ) -> AssistResult<Arc<PdfRetriever>> {
        let index_bytes = source.get(&keys::index_bin(id)).await?;
        let index = VectorIndex::from_bytes(&index_bytes)?;

        let record = match source.get(&keys::index_json(id)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AssistError::General(format!("Corrupt catalog record: {e}")))?,
            // An index without its record is still servable
            Err(StoreError::NotFound(_)) => IndexRecord {
                id: id.clone(),
                filename: String::new(),
                page_count: 0,
                chunk_count: index.len(),
                dimension: index.dimension().get(),
                created_at: Utc::now(),
            },
            Err(e) => return Err(e.into()),
        };

        Ok(Arc::new(PdfRetriever {
            index: Arc::new(index),
            record,
            embedder: Arc::clone(&self.embedder),
        }))
    }

    /// Delete a document and all its artifacts.
    ///
    /// Idempotent: returns `Ok(false)` when nothing existed for the id.
    pub async fn delete(&self, id: &IndexId) -> AssistResult<bool> {
        let lock = self.lock_id(id);
        let _guard = lock.lock().await;

        let result = self.delete_locked(id).await;
        self.inflight.remove(id);
        result
    }

    async fn delete_locked(&self, id: &IndexId) -> AssistResult<bool> {
        let store = self.primary();
        let prefix = keys::id_prefix(id);
        let stored_keys = store.list(&prefix).await?;
        let was_cached = self.cache.remove(id);

        for key in &stored_keys {
            store.delete(key).await?;
        }

        let existed = was_cached || !stored_keys.is_empty();
        if existed {
            info!(%id, removed_keys = stored_keys.len(), "index deleted");
        }
        Ok(existed)
    }

    /// Catalog of all persisted documents.
    pub async fn list(&self) -> AssistResult<Vec<IndexRecord>> {
        let all_keys = self.list_keys(keys::PDFS_PREFIX).await?;
        let mut records = Vec::new();

        for key in all_keys
            .iter()
            .filter(|k| k.ends_with(keys::INDEX_JSON))
        {
            match self.get_from_sources(key).await {
                Ok(bytes) => match serde_json::from_slice::<IndexRecord>(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(key, error = %e, "skipping corrupt catalog record"),
                },
                Err(e) => warn!(key, error = %e, "skipping unreadable catalog record"),
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn get_from_sources(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut last_err = StoreError::NotFound(key.to_string());
        for source in &self.sources {
            match source.get(key).await {
                Ok(bytes) => return Ok(bytes),
                Err(e @ (StoreError::NotFound(_) | StoreError::Unavailable(_))) => last_err = e,
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /// Load the shared reference-corpus retriever, trying each source in
    /// order. Returns `None` when no source has a corpus index; the server
    /// then runs without the reference corpus.
    pub async fn load_corpus(&self) -> AssistResult<Option<Arc<PdfRetriever>>> {
        for source in &self.sources {
            match source.get(&keys::corpus_index_bin()).await {
                Ok(bytes) => {
                    let index = VectorIndex::from_bytes(&bytes)?;
                    let record = match source.get(&keys::corpus_index_json()).await {
                        Ok(record_bytes) => serde_json::from_slice(&record_bytes).map_err(|e| {
                            AssistError::General(format!("Corrupt corpus record: {e}"))
                        })?,
                        Err(StoreError::NotFound(_)) => IndexRecord {
                            id: IndexId::generate(),
                            filename: "corpus".to_string(),
                            page_count: 0,
                            chunk_count: index.len(),
                            dimension: index.dimension().get(),
                            created_at: Utc::now(),
                        },
                        Err(e) => return Err(e.into()),
                    };

                    info!(source = source.name(), chunks = index.len(), "reference corpus loaded");
                    return Ok(Some(Arc::new(PdfRetriever {
                        index: Arc::new(index),
                        record,
                        embedder: Arc::clone(&self.embedder),
                    })));
                }
                Err(StoreError::NotFound(_)) => {
                    debug!(source = source.name(), "no corpus index in source");
                }
                Err(StoreError::Unavailable(reason)) => {
                    warn!(source = source.name(), %reason, "source unavailable for corpus load");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("no reference corpus available from any source");
        Ok(None)
    }

    /// Build the shared reference corpus from pre-chunked text and persist
    /// it to the primary store.
    pub async fn provision_corpus(&self, chunks: Vec<Chunk>) -> AssistResult<IndexRecord> {
        let index = self.build_index(chunks).await?;
        let record = IndexRecord {
            id: IndexId::generate(),
            filename: "corpus".to_string(),
            page_count: 0,
            chunk_count: index.len(),
            dimension: index.dimension().get(),
            created_at: Utc::now(),
        };

        let index_bytes = index.to_bytes()?;
        let record_bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| AssistError::General(format!("Failed to encode corpus record: {e}")))?;

        let store = self.primary();
        store.put(&keys::corpus_index_bin(), index_bytes).await?;
        store.put(&keys::corpus_index_json(), record_bytes).await?;

        info!(chunks = record.chunk_count, "reference corpus provisioned");
        Ok(record)
    }
}
