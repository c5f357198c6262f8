use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::consistency_client::SyncError;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        let status = match err {
            SyncError::SessionLost => StatusCode::UNAUTHORIZED,
            SyncError::CapabilityNotFound => StatusCode::NOT_IMPLEMENTED,
            SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_status_codes() {
        assert_eq!(AppError::from(SyncError::SessionLost).status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(SyncError::CapabilityNotFound).status,
            StatusCode::NOT_IMPLEMENTED
        );
        let transport = AppError::from(SyncError::Transport("HTTP 500".into()));
        assert_eq!(transport.status, StatusCode::BAD_GATEWAY);
        assert_eq!(transport.to_string(), "transport error: HTTP 500");
    }
}
