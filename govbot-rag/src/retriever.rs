//! Nearest-passage lookup against one named index.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RetrievalConfig;
use crate::document::Match;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// The index the New Mexico services knowledge base lives in.
pub const DEFAULT_INDEX_NAME: &str = "chat-app";

/// Queries a single named index on a shared [`VectorIndex`] client.
///
/// Every call first checks that exactly one index carries the configured
/// name, then queries it. Results come back in the order the index returned
/// them.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    index_name: String,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, index_name: impl Into<String>) -> Self {
        Self { index, index_name: index_name.into() }
    }

    /// The index this retriever queries.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Return up to `top_k` matches for `vector` from `namespace`
    /// (the global namespace when `None`).
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if zero or several indexes carry the name
    /// - [`RagError::Retrieval`] if listing or querying fails
    pub async fn retrieve(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<Match>> {
        let namespace = namespace.unwrap_or("");
        self.ensure_index().await?;

        let matches = self
            .index
            .query(&self.index_name, vector, top_k, namespace)
            .await
            .map_err(|e| {
                error!(index = %self.index_name, namespace, error = %e, "index query failed");
                self.wrap(e)
            })?;

        info!(index = %self.index_name, namespace, top_k, match_count = matches.len(), "retrieved matches");
        Ok(matches)
    }

    /// [`retrieve`](Self::retrieve) with the limit and namespace taken from `config`.
    pub async fn retrieve_with(&self, vector: &[f32], config: &RetrievalConfig) -> Result<Vec<Match>> {
        self.retrieve(vector, config.top_k, Some(config.namespace())).await
    }

    async fn ensure_index(&self) -> Result<()> {
        let names = self.index.list_indexes().await.map_err(|e| {
            error!(backend = self.index.backend(), error = %e, "listing indexes failed");
            self.wrap(e)
        })?;

        let found = names.iter().filter(|name| **name == self.index_name).count();
        if found != 1 {
            error!(index = %self.index_name, found, "configured index is not unique");
            return Err(RagError::IndexNotFound { name: self.index_name.clone(), found });
        }

        debug!(index = %self.index_name, "index exists");
        Ok(())
    }

    fn wrap(&self, e: RagError) -> RagError {
        match e {
            e @ (RagError::Retrieval { .. } | RagError::IndexNotFound { .. }) => e,
            other => RagError::Retrieval {
                backend: self.index.backend().to_string(),
                message: other.to_string(),
            },
        }
    }
}
