//! Vector search: embeddings and per-document flat indexes.

pub mod embedding;
pub mod index;
pub mod types;

pub use embedding::{EmbeddingProvider, FastEmbedProvider};
pub use index::{ScoredChunk, VectorIndex, cosine_similarity};
pub use types::{IndexId, Score, VECTOR_DIMENSION_384, VectorDimension, VectorError};

#[cfg(test)]
pub use embedding::MockEmbeddingProvider;
