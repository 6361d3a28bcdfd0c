//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pagelens_core::PageLensError;
use serde::{Deserialize, Serialize};

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// A provider (embedding or LLM) failed
    Upstream(String),
    /// The feature needs a component that is not configured
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                ApiError::new("UPSTREAM_ERROR", "Provider request failed").with_details(msg),
            ),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("SERVICE_UNAVAILABLE", msg),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::internal_error().with_details(msg),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<PageLensError> for AppError {
    fn from(err: PageLensError) -> Self {
        match err {
            PageLensError::NotFound(msg) => AppError::NotFound(msg),
            PageLensError::ValidationError(msg) => AppError::BadRequest(msg),
            err @ (PageLensError::DimensionMismatch { .. } | PageLensError::DuplicateId(_)) => {
                AppError::BadRequest(err.to_string())
            }
            PageLensError::EmbeddingError(msg) => {
                AppError::Upstream(format!("Embedding error: {msg}"))
            }
            PageLensError::LlmError(msg) => AppError::Upstream(format!("LLM error: {msg}")),
            PageLensError::CorruptStore(msg) => {
                AppError::Internal(format!("Corrupt document store: {msg}"))
            }
            PageLensError::StorageError(msg) => AppError::Internal(format!("Storage error: {msg}")),
            PageLensError::ConfigError(msg) => {
                AppError::Internal(format!("Configuration error: {msg}"))
            }
            PageLensError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PageLensError::NotFound("doc".into()), StatusCode::NOT_FOUND),
            (
                PageLensError::DimensionMismatch {
                    expected: 4,
                    actual: 3,
                },
                StatusCode::BAD_REQUEST,
            ),
            (PageLensError::LlmError("timeout".into()), StatusCode::BAD_GATEWAY),
            (
                PageLensError::StorageError("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
