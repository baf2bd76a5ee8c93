//! Vector index trait for nearest-neighbour queries.

use async_trait::async_trait;

use crate::document::Match;
use crate::error::Result;

/// A hosted or local store of embedded passages.
///
/// Implementations return [`RagError::Retrieval`](crate::RagError::Retrieval)
/// for transport or backend failures and an empty `Vec` when a query simply
/// has no hits.
///
/// # Example
///
/// ```rust,ignore
/// use govbot_rag::{InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new();
/// index.create_index("chat-app").await;
/// let names = index.list_indexes().await?;
/// let matches = index.query("chat-app", &query_embedding, 3, "").await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// A short name used in logs and error messages.
    fn backend(&self) -> &str;

    /// List the names of every index visible to this client.
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Return up to `top_k` matches nearest to `vector` within `namespace`,
    /// ordered by descending score, with metadata included.
    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<Match>>;
}
