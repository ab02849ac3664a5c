//! Server error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jwt_service_auth::{FetchError, KeyError, SignError};
use serde_json::json;

/// Errors that stop the service from starting
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Key material could not be loaded
    #[error("failed to load keys: {0}")]
    Keys(#[from] KeyError),

    /// The remote key service client could not be built
    #[error("failed to set up key service client: {0}")]
    KeyService(#[from] FetchError),
}

/// Error answered to an HTTP caller as `{"error": "<message>"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 400 with `message`
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 500 with `message`
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SignError> for ApiError {
    fn from(error: SignError) -> Self {
        tracing::error!(error = %error, "Failed to sign token");
        Self::internal(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
