//! Error types for the bot manager

use api_models::models::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Main error type for the bot manager.
///
/// Expected build failures are not errors: they end up as `failed`
/// deployments. Only infrastructure faults surface here.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to spawn process: {0}")]
    SpawnError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Keeps the whole context chain, not only the outermost message.
impl From<anyhow::Error> for ManagerError {
    fn from(err: anyhow::Error) -> Self {
        ManagerError::Internal(format!("{:#}", err))
    }
}

impl ManagerError {
    /// HTTP status the error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ManagerError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
