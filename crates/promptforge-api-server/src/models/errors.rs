// ABOUTME: HTTP-facing error type and its status-code/JSON-body mapping
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use promptforge_types::{Category, ForgeError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    ValidationError { message: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::ValidationError { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorBody {
            error: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError { message: err.to_string() }
    }
}

/// Maps the core error taxonomy onto HTTP status by category: validation
/// failures are client errors, everything else is a 500 (network/queue
/// failures surface to the caller as opaque internal errors — the job's
/// `error` field carries the detail for polling clients instead).
impl From<ForgeError> for ApiError {
    fn from(err: ForgeError) -> Self {
        match err.category() {
            Category::Validation => ApiError::ValidationError { message: err.to_string() },
            _ => ApiError::Internal { message: err.to_string() },
        }
    }
}
