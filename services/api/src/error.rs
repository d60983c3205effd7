//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! surfaced to the browser: a status code plus a one-line `{"error": ...}` body.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookflow_core::ports::PortError;
use serde_json::json;
use tracing::{error, warn};

/// Shown for every failure the user cannot act on.
const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself was malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Port(PortError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Port(PortError::InvalidState(msg)) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Port(PortError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Type alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;
