//! Flat in-memory vector index over document chunks.
//!
//! An index pairs every chunk of a document with its embedding and answers
//! similarity queries by exact cosine search. Documents here are single PDFs
//! of at most a few hundred chunks, so a flat scan beats any ANN structure
//! on both simplicity and recall.

use crate::document::Chunk;
use crate::vector::{EmbeddingProvider, Score, VectorDimension, VectorError};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a serialized index blob.
const INDEX_MAGIC: &[u8; 4] = b"GYNX";
/// Current on-disk format version.
const INDEX_VERSION: u32 = 1;

/// A chunk returned from a similarity search, with its score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: Score,
}

/// Serializable payload: chunks plus their embeddings, kept in insertion order.
#[derive(Serialize, Deserialize)]
struct IndexPayload {
    dimension: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// An immutable vector index over one document's chunks.
///
/// Construction is all-or-nothing: if embedding any chunk fails, no index is
/// produced. Once built, an index only answers queries; documents are never
/// updated in place, they are deleted and re-registered.
pub struct VectorIndex {
    dimension: VectorDimension,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index by embedding every chunk in one batch.
    ///
    /// # Errors
    /// Fails if the chunk list is empty, if embedding fails, or if the
    /// provider returns vectors of the wrong dimension.
    pub fn build(
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self, VectorError> {
        if chunks.is_empty() {
            return Err(VectorError::EmbeddingFailed(
                "Cannot build an index over zero chunks".to_string(),
            ));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = provider.embed_batch(&texts)?;

        let dimension = provider.dimension();
        for vector in &vectors {
            dimension.validate_vector(vector)?;
        }

        Ok(Self {
            dimension,
            chunks,
            vectors,
        })
    }

    /// Number of chunks in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension of the index.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Find the `k` most similar chunks to a query.
    ///
    /// Results are sorted by descending score; ties keep insertion order.
    /// Asking for more results than the index holds returns everything.
    ///
    /// # Errors
    /// Fails if embedding the query fails.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<ScoredChunk>, VectorError> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_vectors = provider.embed_batch(&[query])?;
        let query_vector = query_vectors.first().ok_or_else(|| {
            VectorError::EmbeddingFailed("Provider returned no embedding for query".to_string())
        })?;
        self.dimension.validate_vector(query_vector)?;

        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(&self.vectors)
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: Score::from_similarity(cosine_similarity(query_vector, vector)),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(k);

        Ok(scored)
    }

    /// Serialize the index into a versioned blob.
    ///
    /// Layout: 4 magic bytes, format version (u32 LE), bincode payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VectorError> {
        let payload = IndexPayload {
            dimension: self.dimension.get(),
            chunks: self.chunks.clone(),
            vectors: self.vectors.clone(),
        };

        let body = bincode::serde::encode_to_vec(&payload, bincode::config::standard())
            .map_err(|e| VectorError::Serialization(format!("Failed to encode index: {e}")))?;

        let mut bytes = Vec::with_capacity(8 + body.len());
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Deserialize an index from a blob produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    /// Fails on truncated data, wrong magic, version mismatch, or a payload
    /// bincode cannot decode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VectorError> {
        if bytes.len() < 8 {
            return Err(VectorError::Serialization(
                "Index blob is truncated (shorter than header)".to_string(),
            ));
        }

        if &bytes[0..4] != INDEX_MAGIC {
            return Err(VectorError::Serialization(
                "Index blob has wrong magic bytes".to_string(),
            ));
        }

        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version_bytes);
        if version != INDEX_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: INDEX_VERSION,
                actual: version,
            });
        }

        let (payload, _): (IndexPayload, usize) =
            bincode::serde::decode_from_slice(&bytes[8..], bincode::config::standard())
                .map_err(|e| VectorError::Serialization(format!("Failed to decode index: {e}")))?;

        if payload.chunks.len() != payload.vectors.len() {
            return Err(VectorError::Serialization(format!(
                "Index blob is inconsistent: {} chunks but {} vectors",
                payload.chunks.len(),
                payload.vectors.len()
            )));
        }

        let dimension = VectorDimension::new(payload.dimension)?;
        for vector in &payload.vectors {
            dimension.validate_vector(vector)?;
        }

        Ok(Self {
            dimension,
            chunks: payload.chunks,
            vectors: payload.vectors,
        })
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
