//! Deterministic providers for tests and local development.
//!
//! - [`MockEmbeddingProvider`] returns one fixed vector for every input.
//! - [`MockCompletionProvider`] streams scripted fragments, or behaves like a
//!   well-grounded model that falls back when the context block is empty.
//! - [`ScriptedIndex`] returns a fixed match list from a fixed set of indexes.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::completion::{CompletionProvider, TokenStream};
use crate::document::{Match, Message};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::prompt::{CONTEXT_END, CONTEXT_START, FALLBACK_ANSWER};
use crate::retriever::DEFAULT_INDEX_NAME;

/// An [`EmbeddingProvider`] that returns the same vector for every input.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    vector: Vec<f32>,
    failure: Option<String>,
    inputs: Mutex<Vec<String>>,
}

impl MockEmbeddingProvider {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector, ..Self::default() }
    }

    /// A provider whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::default() }
    }

    /// Every text submitted so far.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.inputs().len()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(text.to_string());
        }
        match &self.failure {
            Some(message) => {
                Err(RagError::Embedding { provider: "Mock".into(), message: message.clone() })
            }
            None => Ok(self.vector.clone()),
        }
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

#[derive(Debug, Clone)]
enum Script {
    Fixed(Vec<String>),
    Grounded(Vec<String>),
    Fails(String),
}

/// A [`CompletionProvider`] with scripted output.
#[derive(Debug)]
pub struct MockCompletionProvider {
    script: Script,
    trailing_error: Option<String>,
    calls: AtomicUsize,
    last_messages: Mutex<Option<Vec<Message>>>,
}

impl MockCompletionProvider {
    fn with_script(script: Script) -> Self {
        Self { script, trailing_error: None, calls: AtomicUsize::new(0), last_messages: Mutex::new(None) }
    }

    /// Always stream `fragments`.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Fixed(fragments.into_iter().map(Into::into).collect()))
    }

    /// Stream `fragments` when the prompt carries a non-empty context block,
    /// otherwise answer with [`FALLBACK_ANSWER`].
    pub fn grounded<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Grounded(fragments.into_iter().map(Into::into).collect()))
    }

    /// Fail to open the stream.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fails(message.into()))
    }

    /// End the stream with an error after the scripted fragments.
    pub fn fail_after(mut self, message: impl Into<String>) -> Self {
        self.trailing_error = Some(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The messages of the most recent call.
    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.last_messages.lock().ok().and_then(|m| m.clone())
    }

    fn error(message: &str) -> RagError {
        RagError::Completion { provider: "Mock".into(), message: message.to_string() }
    }
}

fn has_empty_context(messages: &[Message]) -> bool {
    let empty_block = format!("{CONTEXT_START}\n\n{CONTEXT_END}");
    messages.first().is_some_and(|m| m.content.contains(&empty_block))
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn stream(&self, messages: Vec<Message>) -> Result<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let empty_context = has_empty_context(&messages);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = Some(messages);
        }

        let fragments = match &self.script {
            Script::Fails(message) => return Err(Self::error(message)),
            Script::Fixed(fragments) => fragments.clone(),
            Script::Grounded(_) if empty_context => vec![FALLBACK_ANSWER.to_string()],
            Script::Grounded(fragments) => fragments.clone(),
        };

        let mut items: Vec<Result<String>> = fragments.into_iter().map(Ok).collect();
        if let Some(message) = &self.trailing_error {
            items.push(Err(Self::error(message)));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// A [`VectorIndex`] that answers every query with a fixed match list.
#[derive(Debug)]
pub struct ScriptedIndex {
    indexes: Vec<String>,
    matches: Vec<Match>,
    failure: Option<String>,
    queries: Mutex<Vec<(usize, String)>>,
}

impl ScriptedIndex {
    /// Serve `matches` from a single index named [`DEFAULT_INDEX_NAME`].
    pub fn new(matches: Vec<Match>) -> Self {
        Self {
            indexes: vec![DEFAULT_INDEX_NAME.to_string()],
            matches,
            failure: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// An index whose queries fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::new(Vec::new()) }
    }

    /// Replace the list of index names reported by `list_indexes`.
    pub fn with_indexes(mut self, indexes: Vec<String>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or_default()
    }

    /// `(top_k, namespace)` of the most recent query.
    pub fn last_query(&self) -> Option<(usize, String)> {
        self.queries.lock().ok().and_then(|q| q.last().cloned())
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn backend(&self) -> &str {
        "Scripted"
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        Ok(self.indexes.clone())
    }

    async fn query(
        &self,
        _index: &str,
        _vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<Match>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((top_k, namespace.to_string()));
        }
        if let Some(message) = &self.failure {
            return Err(RagError::Retrieval { backend: "Scripted".into(), message: message.clone() });
        }
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }
}
