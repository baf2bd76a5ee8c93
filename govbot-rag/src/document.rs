//! Data types for conversations and retrieved passages.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a [`Message`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// A turn written by the end user.
    User,
    /// A turn previously produced by the model.
    Assistant,
}

impl Role {
    /// The wire name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Who wrote the turn.
    pub role: Role,
    /// The text of the turn.
    pub content: String,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    /// Create a `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an `assistant` message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Metadata stored alongside each indexed passage.
///
/// `chunk` and `url` are the fields the pipeline reads; anything else the
/// index returns is kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchMetadata {
    /// The passage text.
    #[serde(default)]
    pub chunk: String,
    /// The page the passage was taken from, when the indexer recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Any other metadata fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A passage returned by a vector index query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    /// Identifier of the stored record.
    pub id: String,
    /// Similarity score (higher is more relevant); `None` when the index sent none.
    #[serde(default)]
    pub score: Option<f32>,
    /// The stored metadata.
    #[serde(default)]
    pub metadata: MatchMetadata,
}

impl Match {
    /// Build a match carrying only a passage and its source URL.
    pub fn new(
        id: impl Into<String>,
        score: f32,
        chunk: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            score: Some(score),
            metadata: MatchMetadata { chunk: chunk.into(), url, extra: HashMap::new() },
        }
    }
}
