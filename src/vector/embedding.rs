//! Embedding generation for vector search functionality.
//!
//! This module provides the capability trait and implementations for turning
//! text into fixed-length vectors. The production implementation uses
//! fastembed with the AllMiniLML6V2 model; tests use a deterministic mock.

use crate::vector::{VECTOR_DIMENSION_384, VectorDimension, VectorError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

/// Trait for generating embeddings from text.
///
/// Implementations of this trait must be thread-safe and capable of handling
/// batch processing efficiently. Dimensionality is fixed per provider
/// instance.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// # Returns
    /// A vector of embeddings, one for each input text, or an error. A
    /// failure for any input fails the whole batch.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this provider.
    #[must_use]
    fn dimension(&self) -> VectorDimension;
}

/// FastEmbed implementation using the AllMiniLML6V2 model.
///
/// Produces 384-dimensional embeddings, matching the sentence-transformers
/// model the reference corpus was indexed with.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
}

impl FastEmbedProvider {
    /// Create a new provider, downloading the model on first use.
    ///
    /// Only 384-dimensional models are accepted; the index format and the
    /// reference corpus both assume that dimensionality.
    ///
    /// # Errors
    /// Returns an error for an unknown model name, or if the model fails to
    /// initialize or download.
    pub fn new(model_name: &str, cache_dir: impl AsRef<Path>) -> Result<Self, VectorError> {
        let embedding_model = match model_name {
            "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
            "AllMiniLML6V2Q" => EmbeddingModel::AllMiniLML6V2Q,
            "AllMiniLML12V2" => EmbeddingModel::AllMiniLML12V2,
            "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
            other => {
                return Err(VectorError::EmbeddingFailed(format!(
                    "Unknown embedding model '{other}'. Supported: AllMiniLML6V2, AllMiniLML6V2Q, AllMiniLML12V2, BGESmallENV15"
                )));
            }
        };

        let model = TextEmbedding::try_new(
            InitOptions::new(embedding_model)
                .with_cache_dir(cache_dir.as_ref().to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        Ok(Self {
            model: Mutex::new(model),
            dimension: VectorDimension::dimension_384(),
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects Vec<String> for the embed method
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        // Validate dimensions
        for embedding in embeddings.iter() {
            if embedding.len() != VECTOR_DIMENSION_384 {
                return Err(VectorError::DimensionMismatch {
                    expected: VECTOR_DIMENSION_384,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Mock embedding provider for testing.
///
/// Generates deterministic embeddings by hashing word tokens into buckets,
/// so texts sharing vocabulary score higher than unrelated texts.
#[cfg(test)]
pub struct MockEmbeddingProvider {
    dimension: VectorDimension,
    fail: bool,
}

#[cfg(test)]
impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockEmbeddingProvider {
    /// Create a new mock provider with standard 384 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
            fail: false,
        }
    }

    /// Create a provider whose every call fails, for rollback tests.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
            fail: true,
        }
    }
}

#[cfg(test)]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if self.fail {
            return Err(VectorError::EmbeddingFailed(
                "mock provider configured to fail".to_string(),
            ));
        }

        let dim = self.dimension.get();
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let mut embedding = vec![0.0f32; dim];
            for word in text.split_whitespace() {
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                word.to_lowercase().hash(&mut hasher);
                let bucket = (hasher.finish() as usize) % dim;
                embedding[bucket] += 1.0;
            }

            // Normalize to unit length (like real embeddings)
            let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for val in &mut embedding {
                    *val /= magnitude;
                }
            }

            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embeddings_are_normalized() {
        let provider = MockEmbeddingProvider::new();

        let texts = vec!["symptoms of endometriosis in early pregnancy"];
        let embeddings = provider.embed_batch(&texts).unwrap();

        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].len(), VECTOR_DIMENSION_384);

        let magnitude: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();

        let a = provider.embed_batch(&["pelvic pain treatment"]).unwrap();
        let b = provider.embed_batch(&["pelvic pain treatment"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let provider = MockEmbeddingProvider::new();
        let embeddings = provider
            .embed_batch(&[
                "menopause hormone therapy options",
                "hormone therapy during menopause",
                "axum router configuration",
            ])
            .unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        let related = dot(&embeddings[0], &embeddings[1]);
        let unrelated = dot(&embeddings[0], &embeddings[2]);
        assert!(related > unrelated);
    }

    #[test]
    fn test_failing_provider_fails_whole_batch() {
        let provider = MockEmbeddingProvider::failing();
        assert!(provider.embed_batch(&["anything"]).is_err());
    }
}
