//! Error types for the assistant
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::store::StoreError;
use crate::vector::{IndexId, VectorError};
use thiserror::Error;

/// Main error type for assistant operations
#[derive(Error, Debug)]
pub enum AssistError {
    /// Bad input from the caller, never retried
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Document contains no extractable text")]
    EmptyDocument,

    #[error(
        "Maximum of {limit} uploaded PDFs allowed ({active} active). Delete an existing PDF first."
    )]
    CapacityExceeded { active: usize, limit: usize },

    #[error("No index found for id '{id}'. The document may have been deleted.")]
    IndexNotFound { id: IndexId },

    /// Blob store failures, including the missing-namespace case that
    /// permits a local-only fallback
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Embedding and index failures
    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error("Language model request failed: {0}")]
    Llm(String),

    #[error("Failed to extract text from PDF: {0}")]
    PdfExtraction(String),

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl AssistError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::EmptyDocument => "EMPTY_DOCUMENT",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::IndexNotFound { .. } => "INDEX_NOT_FOUND",
            Self::Store(StoreError::Unavailable(_)) => "STORE_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Llm(_) => "LLM_ERROR",
            Self::PdfExtraction(_) => "PDF_EXTRACTION_ERROR",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::CapacityExceeded { .. } => vec![
                "Delete one of your uploaded PDFs with DELETE /api/delete-pdf/{id}",
                "List active PDFs with GET /api/pdfs",
            ],
            Self::Store(StoreError::Unavailable(_)) => vec![
                "Check the blob storage account and container configuration",
                "The server can run in local-only mode when no remote store is configured",
            ],
            Self::Store(_) => vec![
                "The operation was not retried; it is safe to retry the whole request",
            ],
            Self::IndexNotFound { .. } => vec![
                "List available PDFs with GET /api/pdfs",
                "Upload the document again with POST /api/upload-pdf",
            ],
            Self::EmptyDocument => vec![
                "The PDF may be image-based or encrypted; only text PDFs are supported",
            ],
            Self::Vector(_) => vec![
                "Verify the embedding model downloaded correctly on first start",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for assistant operations
pub type AssistResult<T> = Result<T, AssistError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, AssistError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, AssistError> {
        self.map_err(|e| AssistError::General(format!("{msg}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        let err = AssistError::CapacityExceeded {
            active: 2,
            limit: 2,
        };
        assert_eq!(err.status_code(), "CAPACITY_EXCEEDED");
        assert!(!err.recovery_suggestions().is_empty());

        let err = AssistError::Store(StoreError::Unavailable("no container".into()));
        assert_eq!(err.status_code(), "STORE_UNAVAILABLE");
    }
}
