//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryIndex`] keeps named indexes of namespaced records behind a
//! `tokio::sync::RwLock`. It is meant for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Match, MatchMetadata};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// A stored passage with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Unique identifier within a namespace.
    pub id: String,
    /// The embedding of `metadata.chunk`.
    pub values: Vec<f32>,
    /// Metadata returned with matches.
    pub metadata: MatchMetadata,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        values: Vec<f32>,
        chunk: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: MatchMetadata { chunk: chunk.into(), url, extra: HashMap::new() },
        }
    }
}

type Namespaces = HashMap<String, HashMap<String, Record>>;

/// An in-memory vector index.
///
/// Layout is index name → namespace → record ID → record.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    indexes: RwLock<HashMap<String, Namespaces>>,
}

impl InMemoryIndex {
    /// Create a new store with no indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named index. No-op if it already exists.
    pub async fn create_index(&self, name: &str) {
        let mut indexes = self.indexes.write().await;
        indexes.entry(name.to_string()).or_default();
    }

    /// Insert or replace records in `namespace` of `index`.
    pub async fn upsert(&self, index: &str, namespace: &str, records: Vec<Record>) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let namespaces = indexes.get_mut(index).ok_or_else(|| missing_index(index))?;
        let store = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            store.insert(record.id.clone(), record);
        }
        Ok(())
    }
}

fn missing_index(name: &str) -> RagError {
    RagError::Retrieval {
        backend: "InMemory".to_string(),
        message: format!("index '{name}' does not exist"),
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend(&self) -> &str {
        "InMemory"
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let indexes = self.indexes.read().await;
        let mut names: Vec<String> = indexes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<Match>> {
        let indexes = self.indexes.read().await;
        let namespaces = indexes.get(index).ok_or_else(|| missing_index(index))?;
        let Some(store) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<Match> = store
            .values()
            .map(|record| Match {
                id: record.id.clone(),
                score: Some(cosine_similarity(&record.values, vector)),
                metadata: record.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}
