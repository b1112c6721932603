//! Fixed-window text chunker with overlap.
//!
//! Documents are split into windows of `CHUNK_SIZE` characters that step
//! forward by `CHUNK_SIZE - CHUNK_OVERLAP`, so consecutive chunks share
//! `CHUNK_OVERLAP` characters of context. Splitting is by character count,
//! not bytes, to stay correct on non-ASCII text.

use crate::document::{Chunk, ExtractedDocument};
use crate::error::{AssistError, AssistResult};

/// Window size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 200;

/// Split an extracted document into overlapping chunks.
///
/// Each chunk records the 1-indexed page it starts on. Pages are chunked
/// independently so a chunk never spans a page boundary, which keeps page
/// attribution exact for citations.
///
/// # Errors
/// Returns [`AssistError::EmptyDocument`] when no page has any
/// non-whitespace text.
pub fn chunk_document(document: &ExtractedDocument) -> AssistResult<Vec<Chunk>> {
    let mut chunks = Vec::new();

    for (page_idx, page_text) in document.pages.iter().enumerate() {
        let trimmed = page_text.trim();
        if trimmed.is_empty() {
            continue;
        }
        chunks.extend(chunk_text(trimmed, page_idx + 1));
    }

    if chunks.is_empty() {
        return Err(AssistError::EmptyDocument);
    }

    Ok(chunks)
}

/// Split one page's text into windows, all attributed to `page`.
fn chunk_text(text: &str, page: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let step = CHUNK_SIZE - CHUNK_OVERLAP;

    if chars.len() <= CHUNK_SIZE {
        return vec![Chunk {
            text: text.to_string(),
            page,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        chunks.push(Chunk {
            text: chars[start..end].iter().collect(),
            page,
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
