//! Streaming chat completion.
//!
//! A [`CompletionProvider`] opens a stream of text fragments for a list of
//! messages. The [`CompletionStreamer`] wraps a provider and delivers that
//! stream either collected into one string ([`CompletionStreamer::complete`])
//! or fragment by fragment ([`CompletionStreamer::relay`]).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use tracing::{debug, error, info};

use crate::document::Message;
use crate::error::{RagError, Result};

/// An ordered stream of answer fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A chat-completion backend that streams its answer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Open a completion stream for `messages`.
    ///
    /// Errors yielded by the returned stream are terminal.
    async fn stream(&self, messages: Vec<Message>) -> Result<TokenStream>;
}

/// Delivers completions in buffered or relay form.
#[derive(Clone)]
pub struct CompletionStreamer {
    provider: Arc<dyn CompletionProvider>,
    open_timeout: Option<Duration>,
}

impl CompletionStreamer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider, open_timeout: None }
    }

    /// Fail if the provider has not started streaming within `timeout`.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(timeout);
        self
    }

    async fn open(&self, messages: Vec<Message>) -> Result<TokenStream> {
        debug!(provider = self.provider.name(), message_count = messages.len(), "opening completion");

        let opening = self.provider.stream(messages);
        let opened = match self.open_timeout {
            Some(limit) => tokio::time::timeout(limit, opening).await.map_err(|_| {
                RagError::Completion {
                    provider: self.provider.name().to_string(),
                    message: format!("no response within {}s", limit.as_secs()),
                }
            })?,
            None => opening.await,
        };

        opened.map_err(|e| self.wrap(e))
    }

    fn wrap(&self, e: RagError) -> RagError {
        match e {
            e @ RagError::Completion { .. } => e,
            other => RagError::Completion {
                provider: self.provider.name().to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Run the completion to the end and return the concatenated answer.
    pub async fn complete(&self, messages: Vec<Message>) -> Result<String> {
        let stream = self.open(messages).await?;
        let fragments: Vec<String> = stream.try_collect().await.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "completion stream failed");
            self.wrap(e)
        })?;
        let answer = fragments.concat();

        info!(provider = self.provider.name(), answer_len = answer.len(), "completion finished");
        Ok(answer)
    }

    /// Open the completion and hand back its fragments as they arrive.
    ///
    /// Stream errors are reported as [`RagError::Completion`].
    pub async fn relay(&self, messages: Vec<Message>) -> Result<TokenStream> {
        let stream = self.open(messages).await?;
        let this = self.clone();
        Ok(Box::pin(stream.map(move |item| {
            item.map_err(|e| {
                error!(provider = this.provider.name(), error = %e, "completion stream failed");
                this.wrap(e)
            })
        })))
    }
}
