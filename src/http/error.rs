//! API error types and response formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors a handler can return to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid request body or form.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// JSON body could not be parsed.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match &self {
            Self::BadRequest(_) => "bad_request",
            Self::Json(_) => "malformed_json",
        };
        tracing::debug!(error = %self, "Rejecting request");

        let body = ErrorResponse {
            error,
            message: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
