//! Document ingestion: PDF extraction and chunking.

pub mod chunker;
pub mod pdf;

use serde::{Deserialize, Serialize};

pub use chunker::{CHUNK_OVERLAP, CHUNK_SIZE, chunk_document};
pub use pdf::extract_text;

/// A contiguous slice of document text with its source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// 1-indexed page the chunk starts on.
    pub page: usize,
}

/// Per-page text extracted from one document.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub pages: Vec<String>,
}

impl ExtractedDocument {
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
