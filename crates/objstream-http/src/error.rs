//! Errors returned by the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use objstream::{StreamError, ValidationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure of an API request, rendered as a JSON `{ "error": ... }` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was rejected before any model call: a missing prompt or
    /// image, a malformed body, or an unsupported model.
    #[error("{0}")]
    BadRequest(String),
    /// The provider could not be reached or failed before any output.
    #[error("Failed to process request")]
    Upstream(#[source] StreamError),
    /// The finished output did not satisfy the endpoint's schema.
    #[error("Failed to process request")]
    Invalid(#[source] ValidationError),
}

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InvalidInput(message) => ApiError::BadRequest(message),
            StreamError::ValidationFailure(err) => ApiError::Invalid(err),
            err @ StreamError::TransportFailure(_) => ApiError::Upstream(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::BadRequest(_) => {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": self.to_string()})))
                    .into_response();
            }
            ApiError::Upstream(source) => {
                error!(error = %source, "request failed");
                json!({"error": self.to_string()})
            }
            ApiError::Invalid(source) => {
                error!(error = %source, "model output failed validation");
                json!({
                    "error": self.to_string(),
                    "details": source.to_string(),
                    "path": source.path(),
                })
            }
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
