//! PDF text extraction.
//!
//! Extraction is CPU-bound and runs on the blocking pool so it never stalls
//! the async runtime while a large document is parsed.

use crate::document::ExtractedDocument;
use crate::error::{AssistError, AssistResult};

/// Extract per-page text from an in-memory PDF.
///
/// # Errors
/// Fails when the bytes are not a parseable PDF, or the extraction task is
/// cancelled. Image-only PDFs parse successfully but yield empty pages; the
/// chunker rejects those downstream.
pub async fn extract_text(bytes: Vec<u8>) -> AssistResult<ExtractedDocument> {
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })
    .await
    .map_err(|e| AssistError::PdfExtraction(format!("Extraction task failed: {e}")))?
    .map_err(|e| AssistError::PdfExtraction(e.to_string()))?;

    Ok(ExtractedDocument { pages })
}
