use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::TryStreamExt;
use govbot_rag::{
    BufferedAnswer, ChatMode, ChatPipeline, Message, OpenAIChatProvider, OpenAIEmbeddingProvider,
    PineconeIndex, RagError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub chat_mode: ChatMode,
}

impl AppState {
    pub fn new(pipeline: Arc<ChatPipeline>, chat_mode: ChatMode) -> Self {
        Self { pipeline, chat_mode }
    }
}

/// Body of `/api/chat` and `/api/urls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Body returned by `/api/urls`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlsResponse {
    pub url: Vec<Option<String>>,
}

/// Build the router with CORS restricted to `allowed_origins`.
///
/// The `*` wildcard and origins that are not valid header values are skipped
/// with a warning.
pub fn app_router(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter(|origin| {
            let wildcard = origin.as_str() == "*";
            if wildcard {
                warn!("ignoring wildcard CORS origin; credentials require explicit origins");
            }
            !wildcard
        })
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/urls", post(urls))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Construct the production pipeline: OpenAI for embeddings and chat,
/// Pinecone for retrieval.
pub fn build_pipeline(config: &ServerConfig) -> Result<ChatPipeline, RagError> {
    let embeddings = OpenAIEmbeddingProvider::new(config.openai_api_key.clone())?
        .with_base_url(config.openai_base_url.clone())
        .with_timeout(config.request_timeout)?;

    let chat = OpenAIChatProvider::with_base_url(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    )?;

    let index = match &config.pinecone_controller_url {
        Some(url) => PineconeIndex::with_controller_url(config.pinecone_api_key.clone(), url.clone())?,
        None => PineconeIndex::new(config.pinecone_api_key.clone(), &config.pinecone_environment)?,
    }
    .with_timeout(config.request_timeout)?;

    ChatPipeline::builder()
        .embedding_provider(Arc::new(embeddings))
        .vector_index(Arc::new(index))
        .completion_provider(Arc::new(chat))
        .completion_timeout(config.request_timeout)
        .build()
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).context("failed to build chat pipeline")?;
    let state = AppState::new(Arc::new(pipeline), config.chat_mode);
    let app = app_router(state, &config.allowed_origins);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for govbot server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(mode = ?config.chat_mode, "Server is running on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"govbot"}))
}

fn conversation(
    route: &'static str,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Vec<Message>, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::new(route, RagError::MalformedRequest(e.body_text())))?;
    if request.messages.is_empty() {
        return Err(ApiError::new(route, RagError::MalformedRequest("messages must not be empty".into())));
    }
    Ok(request.messages)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let messages = conversation("/api/chat", payload)?;

    match state.chat_mode {
        ChatMode::Buffered => {
            let answer: BufferedAnswer = state
                .pipeline
                .answer(&messages)
                .await
                .map_err(|e| ApiError::new("/api/chat", e))?;
            Ok(Json(answer).into_response())
        }
        ChatMode::Relay => {
            let stream = state
                .pipeline
                .answer_stream(&messages)
                .await
                .map_err(|e| ApiError::new("/api/chat", e))?;
            // Bytes already sent stay sent; a failed stream aborts the body.
            let body = Body::from_stream(stream.inspect_err(|e| {
                warn!(route = "/api/chat", kind = e.kind(), error = %e, "relay aborted");
            }));
            Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
        }
    }
}

async fn urls(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<UrlsResponse>, ApiError> {
    let messages = conversation("/api/urls", payload)?;
    let url = state
        .pipeline
        .source_urls(&messages)
        .await
        .map_err(|e| ApiError::new("/api/urls", e))?;
    Ok(Json(UrlsResponse { url }))
}
