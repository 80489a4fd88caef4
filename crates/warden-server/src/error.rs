//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use warden_core::ModerationError;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request body, length, or enum value.
    #[error("invalid input: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ModerationError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(details) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Invalid moderation request".to_string(),
                    details,
                },
            ),
            ApiError::Internal(details) => {
                error!("Moderation error: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal moderation error".to_string(),
                        details: "unexpected failure while moderating content".to_string(),
                    },
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
