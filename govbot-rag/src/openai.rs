//! OpenAI providers: embeddings over `reqwest` and streaming chat through
//! `async-openai`.
//!
//! This module is only available when the `openai` feature is enabled.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{CompletionProvider, TokenStream};
use crate::document::{Message, Role};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The embedding model the knowledge base was indexed with.
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Dimensionality of [`EMBEDDING_MODEL`].
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// The chat model answers are generated with.
pub const COMPLETION_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature for answers.
pub const COMPLETION_TEMPERATURE: f32 = 0.2;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Example
///
/// ```rust,ignore
/// use govbot_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Embedding {
                provider: "OpenAI".into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self {
            client: build_http_client(Some(DEFAULT_TIMEOUT))?,
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: EMBEDDING_MODEL.into(),
            dimensions: EMBEDDING_DIMENSIONS,
        })
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every embeddings request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_http_client(Some(timeout))?;
        Ok(self)
    }

    fn error(message: String) -> RagError {
        RagError::Embedding { provider: "OpenAI".into(), message }
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), model = %self.model, "requesting embedding");

        let request_body = EmbeddingRequest { model: &self.model, input: text };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "OpenAI", error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = "OpenAI", %status, "API error");
            return Err(Self::error(format!("API returned {status}: {detail}")));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            Self::error(format!("failed to parse response: {e}"))
        })?;

        embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Self::error("API returned empty response".into()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`CompletionProvider`] that streams answers from the OpenAI chat API.
///
/// The model and temperature are fixed to [`COMPLETION_MODEL`] and
/// [`COMPLETION_TEMPERATURE`].
pub struct OpenAIChatProvider {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatProvider {
    /// Create a new chat provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a chat provider for an OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Completion {
                provider: "OpenAI".into(),
                message: "API key must not be empty".into(),
            });
        }

        let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(base_url);
        // Connect timeout only; the stream itself is unbounded.
        let http = build_http_client(None)?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model: COMPLETION_MODEL.into(),
            temperature: COMPLETION_TEMPERATURE,
        })
    }

    fn error(message: String) -> RagError {
        RagError::Completion { provider: "OpenAI".into(), message }
    }
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let content = message.content.as_str();
    let built: std::result::Result<ChatCompletionRequestMessage, _> = match message.role {
        Role::System => {
            ChatCompletionRequestSystemMessageArgs::default().content(content).build().map(Into::into)
        }
        Role::User => {
            ChatCompletionRequestUserMessageArgs::default().content(content).build().map(Into::into)
        }
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map(Into::into),
    };
    built.map_err(|e| OpenAIChatProvider::error(format!("failed to build message: {e}")))
}

#[async_trait]
impl CompletionProvider for OpenAIChatProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn stream(&self, messages: Vec<Message>) -> Result<TokenStream> {
        let request_messages =
            messages.iter().map(to_request_message).collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .stream(true)
            .messages(request_messages)
            .build()
            .map_err(|e| Self::error(format!("failed to build request: {e}")))?;

        debug!(provider = "OpenAI", model = %self.model, "requesting chat completion stream");

        let mut upstream = self.client.chat().create_stream(request).await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "chat completion request failed");
            Self::error(format!("API error: {e}"))
        })?;

        let stream = try_stream! {
            while let Some(result) = upstream.next().await {
                let chunk = result.map_err(|e| Self::error(format!("stream error: {e}")))?;
                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            yield text;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_keys_are_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::Embedding { .. })));
        assert!(matches!(OpenAIChatProvider::new(""), Err(RagError::Completion { .. })));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:9000/v1/");
        assert_eq!(provider.base_url, "http://localhost:9000/v1");
        assert_eq!(provider.dimensions(), EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn every_role_converts() {
        for message in
            [Message::system("rules"), Message::user("question"), Message::assistant("answer")]
        {
            assert!(to_request_message(&message).is_ok());
        }
    }
}
