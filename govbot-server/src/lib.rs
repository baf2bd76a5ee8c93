//! `govbot-server` exposes the grounded chat pipeline over HTTP.
//!
//! - `POST /api/chat` answers a conversation, buffered with a source URL or
//!   relayed fragment by fragment depending on the deployment's chat mode.
//! - `POST /api/urls` lists the source URLs that would ground the question.
//! - `GET /health` reports liveness.

pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ErrorBody, GENERIC_ERROR};
pub use server::{AppState, ChatRequest, UrlsResponse, app_router, build_pipeline, run_server};
pub use telemetry::{LogFormat, init_tracing};
