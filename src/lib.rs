//! Retrieval-augmented question answering over gynecology literature.
//!
//! The crate pairs a shared reference corpus with per-upload PDF indexes:
//! every uploaded document is chunked, embedded, and persisted as an
//! immutable vector index in blob storage, then served through an HTTP API
//! that answers questions with numbered citations.
//!
//! Module map:
//! - [`document`] — PDF text extraction and overlapping chunking
//! - [`vector`] — embeddings and flat per-document indexes
//! - [`store`] — blob storage backends (Azure, local, memory)
//! - [`lifecycle`] — build/persist/resolve/delete of indexes
//! - [`answer`] — prompt assembly, citations, LLM providers
//! - [`server`] — the axum HTTP surface

pub mod answer;
pub mod config;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod vector;

pub use config::Settings;
pub use error::{AssistError, AssistResult};
pub use lifecycle::{ActiveIndexCache, IndexLifecycleManager, IndexRecord, PdfRetriever};
pub use vector::{IndexId, Score, VectorIndex};
