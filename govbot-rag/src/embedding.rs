//! Embedding provider trait and the [`Embedder`] that wraps it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Turns message text into a query vector.
///
/// Line breaks are replaced with spaces before the text is submitted. Any
/// provider failure, or a vector whose length differs from the provider's
/// [`dimensions`](EmbeddingProvider::dimensions), comes back as
/// [`RagError::Embedding`].
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Embed one piece of text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRequest`] for blank input and
    /// [`RagError::Embedding`] when the provider fails.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = normalize_newlines(text);
        if normalized.trim().is_empty() {
            return Err(RagError::MalformedRequest("message content is empty".into()));
        }

        debug!(provider = self.provider.name(), text_len = normalized.len(), "embedding query");

        let vector = self.provider.embed(&normalized).await.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "embedding failed");
            match e {
                e @ RagError::Embedding { .. } => e,
                other => RagError::Embedding {
                    provider: self.provider.name().to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let expected = self.provider.dimensions();
        if vector.len() != expected {
            error!(provider = self.provider.name(), expected, actual = vector.len(), "embedding has wrong length");
            return Err(RagError::Embedding {
                provider: self.provider.name().to_string(),
                message: format!("expected {expected} dimensions, got {}", vector.len()),
            });
        }
        Ok(vector)
    }
}

/// Replace every line break (`\r\n`, `\r` or `\n`) with a single space.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}
