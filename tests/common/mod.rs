//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use gynassist::answer::{LlmProvider, WebLookup, WebSnippet};
use gynassist::error::{AssistError, AssistResult};
use gynassist::vector::{EmbeddingProvider, VECTOR_DIMENSION_384, VectorDimension, VectorError};

/// Deterministic embedder hashing word tokens into buckets, normalized to
/// unit length. Texts sharing vocabulary score higher than unrelated texts,
/// which is all retrieval assertions need.
pub struct HashEmbedder {
    dimension: VectorDimension,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
        }
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let dim = self.dimension.get();
        let mut out = Vec::with_capacity(texts.len());

        for text in texts {
            let mut embedding = vec![0.0f32; dim];
            for word in text.split_whitespace() {
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                word.to_lowercase().hash(&mut hasher);
                embedding[(hasher.finish() as usize) % dim] += 1.0;
            }
            let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for value in &mut embedding {
                    *value /= magnitude;
                }
            }
            out.push(embedding);
        }
        Ok(out)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Embedder that stalls before answering, widening the window in which
/// concurrent registrations overlap.
pub struct SlowEmbedder {
    inner: HashEmbedder,
    delay: std::time::Duration,
}

impl SlowEmbedder {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            inner: HashEmbedder::new(),
            delay,
        }
    }
}

impl EmbeddingProvider for SlowEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        // Runs on the blocking pool, a hard sleep is fine here
        std::thread::sleep(self.delay);
        self.inner.embed_batch(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.inner.dimension()
    }
}

/// Embedder that fails every batch, for rollback assertions.
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Err(VectorError::EmbeddingFailed("forced failure".to_string()))
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(VECTOR_DIMENSION_384).unwrap()
    }
}

/// LLM stub that echoes a marker so tests can tell a real completion from a
/// degraded answer.
pub struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> AssistResult<String> {
        Ok(format!("stub answer ({} prompt chars)", user.len()))
    }
}

/// LLM stub that always fails.
pub struct OfflineLlm;

#[async_trait]
impl LlmProvider for OfflineLlm {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> AssistResult<String> {
        Err(AssistError::Llm("model offline".to_string()))
    }
}

/// Web lookup returning nothing, to keep general-question tests focused on
/// retrieval.
pub struct NoWeb;

#[async_trait]
impl WebLookup for NoWeb {
    async fn lookup(&self, _question: &str) -> Vec<WebSnippet> {
        Vec::new()
    }
}

/// Build a minimal one-page PDF containing `text`, valid enough for
/// pdf-extract to parse.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    minimal_pdf_pages(&[text])
}

/// Build a minimal PDF with one page per entry in `page_texts`. Offsets in
/// the xref table are computed as the objects are appended.
///
/// Object layout: 1 catalog, 2 page tree, 3 font, then a page object and a
/// content stream per page.
pub fn minimal_pdf_pages(page_texts: &[&str]) -> Vec<u8> {
    assert!(!page_texts.is_empty());

    let kids = (0..page_texts.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{kids}] /Count {} >>",
            page_texts.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    for (i, text) in page_texts.iter().enumerate() {
        let escaped = text
            .replace('\\', r"\\")
            .replace('(', r"\(")
            .replace(')', r"\)");
        let content = format!("BT /F1 12 Tf 72 720 Td ({escaped}) Tj ET");

        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    pdf.into_bytes()
}
