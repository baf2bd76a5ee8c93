//! Mapping pipeline failures onto the HTTP error shape.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use govbot_rag::RagError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// The only error message clients ever see.
pub const GENERIC_ERROR: &str = "An error occurred.";

/// Body of every failed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// A request failure, reported to the client as a flat `500`.
#[derive(Debug)]
pub struct ApiError {
    route: &'static str,
    source: RagError,
}

impl ApiError {
    pub fn new(route: &'static str, source: RagError) -> Self {
        Self { route, source }
    }

    /// The underlying failure.
    pub fn source(&self) -> &RagError {
        &self.source
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(route = self.route, kind = self.source.kind(), error = %self.source, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: GENERIC_ERROR.to_string() }))
            .into_response()
    }
}
