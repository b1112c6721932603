//! Answer composition: prompt assembly, citations, and LLM invocation.

pub mod llm;
pub mod web;

use crate::vector::ScoredChunk;
use tracing::warn;

pub use llm::{AzureOpenAiProvider, LlmProvider, UnconfiguredProvider};
pub use web::{StaticWebLookup, WebLookup, WebSnippet};

const SYSTEM_PROMPT: &str = "You are a medical assistant specializing in gynecology. \
Provide clear, accurate information based on medical literature and web search results. \
Include relevant details and maintain a professional tone.";

const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.3;

/// A composed answer with its numbered source list.
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Compose an answer from retrieved chunks and optional web snippets.
///
/// Citations are 1-indexed, retrieved chunks first and web snippets after,
/// in the same order they appear in the prompt. An LLM failure degrades to
/// an error answer that still carries the full citation list, so the caller
/// can render sources either way.
pub async fn compose_answer(
    question: &str,
    document_name: &str,
    hits: &[ScoredChunk],
    web_snippets: &[WebSnippet],
    llm: &dyn LlmProvider,
) -> ComposedAnswer {
    let mut citations = Vec::with_capacity(hits.len() + web_snippets.len());

    for (i, hit) in hits.iter().enumerate() {
        citations.push(format!(
            "[{}] {}, page {}",
            i + 1,
            document_name,
            hit.chunk.page
        ));
    }

    for (i, snippet) in web_snippets.iter().enumerate() {
        let image = snippet.image_url.as_deref().unwrap_or("");
        citations.push(format!(
            "[{}] Web Search Result #{}: {} ({}) [img:{}]",
            hits.len() + i + 1,
            i + 1,
            snippet.title,
            snippet.source_url,
            image
        ));
    }

    let prompt = build_prompt(question, document_name, hits, web_snippets);

    match llm
        .complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS, TEMPERATURE)
        .await
    {
        Ok(answer) => ComposedAnswer {
            answer,
            sources: citations,
        },
        Err(e) => {
            warn!(error = %e, "answer generation failed");
            ComposedAnswer {
                answer: format!("Error generating response: {e}"),
                sources: citations,
            }
        }
    }
}

fn build_prompt(
    question: &str,
    document_name: &str,
    hits: &[ScoredChunk],
    web_snippets: &[WebSnippet],
) -> String {
    let doc_context = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "Document {} (from {}, page {}):\n{}",
                i + 1,
                document_name,
                hit.chunk.page,
                hit.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = format!(
        "Based on the following information, answer this question: {question}\n\n\
         Medical literature:\n{doc_context}\n"
    );

    if !web_snippets.is_empty() {
        let web_context = web_snippets
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Web Result {}:\nTitle: {}\nContent: {}\nURL: {}",
                    i + 1,
                    s.title,
                    s.body,
                    s.source_url
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        prompt.push_str(&format!("\nWeb search results:\n{web_context}\n"));
        prompt.push_str(
            "\nProvide a detailed and accurate answer based on all the information provided.\n\
             Include citations like [1], [2], etc. when referencing specific information.\n\
             If there are different perspectives or information from different sources, \
             mention them and prioritize the most reliable sources.\n",
        );
    } else {
        prompt.push_str(
            "\nProvide a detailed and accurate answer based on the medical literature.\n\
             Include citations like [1], [2], etc. when referencing specific information.\n",
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;
    use crate::error::{AssistError, AssistResult};
    use crate::vector::Score;
    use async_trait::async_trait;

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> AssistResult<String> {
            Ok(format!("ECHO:{}", user.len()))
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
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

    fn hit(text: &str, page: usize) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_string(),
                page,
            },
            score: Score::from_similarity(0.9),
        }
    }

    fn snippet(title: &str) -> WebSnippet {
        WebSnippet {
            title: title.to_string(),
            body: "body".to_string(),
            source_url: "https://example.org/ref".to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_citations_number_chunks_before_web() {
        let hits = vec![hit("first", 3), hit("second", 7)];
        let snippets = vec![snippet("External Ref")];

        let composed =
            compose_answer("question?", "guide.pdf", &hits, &snippets, &EchoLlm).await;

        assert_eq!(composed.sources.len(), 3);
        assert_eq!(composed.sources[0], "[1] guide.pdf, page 3");
        assert_eq!(composed.sources[1], "[2] guide.pdf, page 7");
        assert!(composed.sources[2].starts_with("[3] Web Search Result #1: External Ref"));
        assert!(composed.answer.starts_with("ECHO:"));
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_but_keeps_sources() {
        let hits = vec![hit("only", 1)];
        let composed = compose_answer("q", "doc.pdf", &hits, &[], &FailingLlm).await;

        assert!(composed.answer.starts_with("Error generating response:"));
        assert_eq!(composed.sources, vec!["[1] doc.pdf, page 1"]);
    }

    #[test]
    fn test_prompt_mentions_web_instructions_only_with_snippets() {
        let hits = vec![hit("text", 1)];
        let without = build_prompt("q", "d.pdf", &hits, &[]);
        assert!(!without.contains("Web search results:"));

        let with = build_prompt("q", "d.pdf", &hits, &[snippet("Ref")]);
        assert!(with.contains("Web search results:"));
        assert!(with.contains("most reliable sources"));
    }
}
