//! Blob storage abstraction.
//!
//! All persistence goes through the [`BlobStore`] capability trait so the
//! lifecycle manager is indifferent to whether blobs live in Azure, on the
//! local filesystem, or in memory for tests. Keys form a flat namespace
//! with `/`-separated segments; the layout is defined in [`keys`].

pub mod azure;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

/// Errors from blob store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store or its container is not reachable or not provisioned.
    /// Resolution may fall through to the next configured source.
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),

    /// The requested blob does not exist.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// A transport or protocol failure against a remote store.
    #[error("Blob store request failed: {0}")]
    Http(String),

    /// A filesystem failure in a local store.
    #[error("Blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability trait over a flat blob namespace.
///
/// Operations either fully succeed or return an error; there are no partial
/// writes visible through this interface.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// A short label for logging ("azure", "local", "memory").
    fn name(&self) -> &'static str;

    /// Whether the backing container/root exists and is reachable.
    async fn container_exists(&self) -> Result<bool, StoreError>;

    /// Write a blob, replacing any existing blob at `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Read a blob. Returns [`StoreError::NotFound`] when absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// List all keys starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Delete a blob. Deleting an absent blob is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Blob key layout.
///
/// Per-document artifacts live under `pdfs/{id}/`:
/// - `pdfs/{id}/{filename}` — the original upload
/// - `pdfs/{id}/faiss_index/index.bin` — the serialized vector index
/// - `pdfs/{id}/faiss_index/index.json` — the catalog record
///
/// The shared reference corpus lives under `corpus/faiss_index/` with the
/// same two files.
pub mod keys {
    use crate::vector::IndexId;

    pub const INDEX_BIN: &str = "index.bin";
    pub const INDEX_JSON: &str = "index.json";

    /// Prefix covering every artifact of one document.
    #[must_use]
    pub fn id_prefix(id: &IndexId) -> String {
        format!("pdfs/{id}/")
    }

    /// Key of the uploaded source document.
    #[must_use]
    pub fn source_document(id: &IndexId, filename: &str) -> String {
        format!("pdfs/{id}/{filename}")
    }

    /// Key of the serialized index blob.
    #[must_use]
    pub fn index_bin(id: &IndexId) -> String {
        format!("pdfs/{id}/faiss_index/{INDEX_BIN}")
    }

    /// Key of the catalog record.
    #[must_use]
    pub fn index_json(id: &IndexId) -> String {
        format!("pdfs/{id}/faiss_index/{INDEX_JSON}")
    }

    /// Prefix under which every document's catalog record lives.
    pub const PDFS_PREFIX: &str = "pdfs/";

    /// Key of the shared reference-corpus index blob.
    #[must_use]
    pub fn corpus_index_bin() -> String {
        format!("corpus/faiss_index/{INDEX_BIN}")
    }

    /// Key of the shared reference-corpus catalog record.
    #[must_use]
    pub fn corpus_index_json() -> String {
        format!("corpus/faiss_index/{INDEX_JSON}")
    }

    /// Extract the document id from any key under its prefix.
    #[must_use]
    pub fn id_from_key(key: &str) -> Option<IndexId> {
        let rest = key.strip_prefix(PDFS_PREFIX)?;
        let token = rest.split('/').next()?;
        IndexId::parse(token)
    }

}
