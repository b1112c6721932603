//! Language model providers.

use crate::config::OpenAiConfig;
use crate::error::{AssistError, AssistResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Capability trait over a chat-completion model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one system+user exchange and return the model's reply.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> AssistResult<String>;
}

/// Azure OpenAI chat-completions client.
pub struct AzureOpenAiProvider {
    client: Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl AzureOpenAiProvider {
    /// Build a provider from OpenAI settings.
    ///
    /// # Errors
    /// Fails when endpoint or API key is missing, or the HTTP client cannot
    /// be constructed.
    pub fn new(config: &OpenAiConfig) -> AssistResult<Self> {
        if config.endpoint.is_empty() || config.api_key.is_empty() {
            return Err(AssistError::Llm(
                "Azure OpenAI endpoint and api_key must be configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AssistError::Llm(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                config.endpoint.trim_end_matches('/'),
                config.deployment,
                config.api_version
            ),
            api_key: config.api_key.clone(),
        })
    }
}

/// Stand-in used when no language model is configured.
///
/// Every completion fails, which degrades answers to an error message that
/// still carries the retrieved sources.
pub struct UnconfiguredProvider;

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> AssistResult<String> {
        Err(AssistError::Llm(
            "Azure OpenAI client not available".to_string(),
        ))
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> AssistResult<String> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistError::Llm(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistError::Llm(format!(
                "Chat completion returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AssistError::Llm(format!("Malformed response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AssistError::Llm("Response contained no completion".to_string()))
    }
}
