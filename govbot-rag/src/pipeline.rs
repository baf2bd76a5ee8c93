//! Grounded chat pipeline.
//!
//! The [`ChatPipeline`] runs one conversation through
//! embed → retrieve → assemble → prompt → complete, and separately answers
//! "which sources would ground this question" with retrieval alone.
//!
//! # Example
//!
//! ```rust,ignore
//! use govbot_rag::{ChatPipeline, Message, PipelineConfig};
//!
//! let pipeline = ChatPipeline::builder()
//!     .config(PipelineConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_index(Arc::new(index))
//!     .completion_provider(Arc::new(chat))
//!     .build()?;
//!
//! let answer = pipeline.answer(&[Message::user("How do I renew my license?")]).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::completion::{CompletionProvider, CompletionStreamer, TokenStream};
use crate::config::PipelineConfig;
use crate::context::{assemble_context, primary_url, source_urls};
use crate::document::Message;
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::prompt::PromptBuilder;
use crate::retriever::{DEFAULT_INDEX_NAME, Retriever};

/// A fully buffered answer and the source that best grounds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BufferedAnswer {
    /// The complete answer text.
    pub data: String,
    /// URL of the first qualifying source, or `""`.
    pub url: String,
}

/// The model input for one conversation, plus the query vector that produced it.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    /// Embedding of the last conversation turn.
    pub query_vector: Vec<f32>,
    /// The grounding context inserted into the system message.
    pub context: String,
    /// Messages ready for the completion service.
    pub messages: Vec<Message>,
}

/// Orchestrates retrieval-grounded chat.
///
/// Holds long-lived provider handles; cheap to share behind an `Arc`.
pub struct ChatPipeline {
    config: PipelineConfig,
    embedder: Embedder,
    retriever: Retriever,
    prompt: PromptBuilder,
    completion: CompletionStreamer,
}

impl ChatPipeline {
    /// Create a new [`ChatPipelineBuilder`].
    pub fn builder() -> ChatPipelineBuilder {
        ChatPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    fn query_turn(conversation: &[Message]) -> Result<&Message> {
        let last = conversation
            .last()
            .ok_or_else(|| RagError::MalformedRequest("messages must not be empty".into()))?;
        if last.content.trim().is_empty() {
            return Err(RagError::MalformedRequest("last message has no content".into()));
        }
        Ok(last)
    }

    /// Embed the last turn, retrieve context for it and build the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRequest`] for an empty conversation and
    /// propagates embedding and retrieval failures.
    pub async fn prepare(&self, conversation: &[Message]) -> Result<PreparedPrompt> {
        let query = Self::query_turn(conversation)?;
        let query_vector = self.embedder.embed(&query.content).await?;

        let matches = self.retriever.retrieve_with(&query_vector, &self.config.context).await?;
        let context =
            assemble_context(&matches, &self.config.context, self.config.max_context_chars);
        debug!(match_count = matches.len(), context_chars = context.chars().count(), "assembled context");

        let messages = self.prompt.build(&context, conversation);
        Ok(PreparedPrompt { query_vector, context, messages })
    }

    /// Answer the conversation and return the whole text with its source URL.
    ///
    /// The source is looked up with a second retrieval pass at the stricter
    /// source settings once the answer is complete.
    pub async fn answer(&self, conversation: &[Message]) -> Result<BufferedAnswer> {
        let prepared = self.prepare(conversation).await?;
        let data = self.completion.complete(prepared.messages).await?;

        let url = match &self.config.source {
            Some(source) => {
                let matches = self.retriever.retrieve_with(&prepared.query_vector, source).await?;
                primary_url(&matches, source)
            }
            None => String::new(),
        };

        info!(answer_len = data.len(), has_source = !url.is_empty(), "answered conversation");
        Ok(BufferedAnswer { data, url })
    }

    /// Answer the conversation as a stream of fragments in arrival order.
    pub async fn answer_stream(&self, conversation: &[Message]) -> Result<TokenStream> {
        let prepared = self.prepare(conversation).await?;
        let stream = self.completion.relay(prepared.messages).await?;
        info!("relaying answer");
        Ok(stream)
    }

    /// URLs of every qualifying source for the last turn, in index order.
    ///
    /// Entries are `None` where the stored passage has no URL.
    pub async fn source_urls(&self, conversation: &[Message]) -> Result<Vec<Option<String>>> {
        let query = Self::query_turn(conversation)?;
        let query_vector = self.embedder.embed(&query.content).await?;
        let matches = self.retriever.retrieve_with(&query_vector, &self.config.urls).await?;
        let urls = source_urls(&matches, &self.config.urls);
        info!(url_count = urls.len(), "listed source urls");
        Ok(urls)
    }
}

/// Builder for constructing a [`ChatPipeline`].
///
/// The embedding provider, vector index and completion provider are
/// required. The configuration defaults to [`PipelineConfig::default`] and
/// the index name to [`DEFAULT_INDEX_NAME`].
#[derive(Default)]
pub struct ChatPipelineBuilder {
    config: Option<PipelineConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    index_name: Option<String>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    prompt: Option<PromptBuilder>,
    completion_timeout: Option<Duration>,
}

impl ChatPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the shared vector index client.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Query an index other than [`DEFAULT_INDEX_NAME`].
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Set the prompt builder.
    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Fail a completion that has not started streaming within `timeout`.
    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = Some(timeout);
        self
    }

    /// Build the [`ChatPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing, the index
    /// name is blank, the context budget is zero or any retrieval pass fails
    /// [`RetrievalConfig::validate`](crate::RetrievalConfig::validate).
    pub fn build(self) -> Result<ChatPipeline> {
        let config = self.config.unwrap_or_default();
        if config.max_context_chars == 0 {
            return Err(RagError::Config("max_context_chars must be greater than zero".into()));
        }
        config.context.validate()?;
        if let Some(source) = &config.source {
            source.validate()?;
        }
        config.urls.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::Config("completion_provider is required".to_string()))?;
        let index_name = self.index_name.unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());
        if index_name.trim().is_empty() {
            return Err(RagError::Config("index name must not be empty".to_string()));
        }

        let mut completion = CompletionStreamer::new(completion_provider);
        if let Some(timeout) = self.completion_timeout {
            completion = completion.with_open_timeout(timeout);
        }

        Ok(ChatPipeline {
            config,
            embedder: Embedder::new(embedding_provider),
            retriever: Retriever::new(vector_index, index_name),
            prompt: self.prompt.unwrap_or_default(),
            completion,
        })
    }
}
