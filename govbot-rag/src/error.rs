//! Error types for the `govbot-rag` crate.

use thiserror::Error;

/// Errors that can occur while answering a grounded chat request.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding service rejected the call or could not be reached.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index rejected a query or could not be reached.
    #[error("Retrieval error ({backend}): {message}")]
    Retrieval {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The configured index name did not resolve to exactly one index.
    #[error("Index '{name}' does not exist (found {found} matching indexes)")]
    IndexNotFound {
        /// The configured index name.
        name: String,
        /// How many indexes carried that name.
        found: usize,
    },

    /// The completion service failed to open or continue a stream.
    #[error("Completion error ({provider}): {message}")]
    Completion {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The incoming conversation cannot be processed.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Short, stable label for the failing stage, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embedding { .. } => "embedding_failure",
            Self::Retrieval { .. } => "retrieval_failure",
            Self::IndexNotFound { .. } => "index_not_found",
            Self::Completion { .. } => "completion_failure",
            Self::MalformedRequest(_) => "malformed_request",
            Self::Config(_) => "config",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
