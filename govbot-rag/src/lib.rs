//! # govbot-rag
//!
//! Retrieval-grounded chat for the New Mexico Government Services Bot.
//!
//! ## Overview
//!
//! A conversation's last turn is embedded, the nearest passages are pulled
//! from a vector index, the qualifying passages become a bounded grounding
//! context, and a chat model answers from that context only.
//!
//! - [`Embedder`] / [`EmbeddingProvider`]: query vectors
//! - [`Retriever`] / [`VectorIndex`]: nearest passages from one named index
//! - [`assemble_context`]: score filtering and the character budget
//! - [`PromptBuilder`]: persona, context block, answering rules
//! - [`CompletionStreamer`] / [`CompletionProvider`]: buffered or relayed answers
//! - [`ChatPipeline`]: the whole flow, plus source-URL listing
//!
//! ## Features
//!
//! - `openai` (default): OpenAI embeddings and streaming chat
//! - `pinecone` (default): Pinecone REST index client

pub mod completion;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod mock;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use completion::{CompletionProvider, CompletionStreamer, TokenStream};
pub use config::{ChatMode, PipelineConfig, RetrievalConfig, RetrievalConfigBuilder, ScoreBound};
pub use context::{assemble_context, primary_url, qualifying, source_urls};
pub use document::{Match, MatchMetadata, Message, Role};
pub use embedding::{Embedder, EmbeddingProvider};
pub use error::{RagError, Result};
pub use index::VectorIndex;
pub use inmemory::{InMemoryIndex, Record};
pub use pipeline::{BufferedAnswer, ChatPipeline, ChatPipelineBuilder, PreparedPrompt};
pub use prompt::{FALLBACK_ANSWER, HistoryPolicy, PromptBuilder};
pub use retriever::{DEFAULT_INDEX_NAME, Retriever};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
#[cfg(feature = "pinecone")]
pub use pinecone::PineconeIndex;
