use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::shared::types::ApiResponse;

/// Request validation failures, detected before any mutation happens
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Content type '{content_type}' is not allowed for {file_type} files")]
    InvalidContentType {
        content_type: String,
        file_type: String,
    },

    #[error("File too large: {size} bytes exceeds the maximum of {max} bytes")]
    FileTooLarge { size: i64, max: i64 },

    #[error("Batch must contain at least one file")]
    EmptyBatch,

    #[error("Batch contains {count} files, maximum is {max}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Object storage (presigned URL issuance, object deletion) failed
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn file_not_found() -> Self {
        AppError::NotFound("File not found".to_string())
    }

    pub fn file_forbidden() -> Self {
        AppError::Forbidden("You do not have permission to access this file".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::Validation(ref err) => {
                let msg = err.to_string();
                (StatusCode::BAD_REQUEST, msg.clone(), Some(vec![msg]))
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Unauthorized(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::Timeout(ref msg) => {
                tracing::warn!("Request timed out: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, msg.clone(), None)
            }
            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone(), None)
            }
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (
                AppError::Validation(ValidationError::EmptyBatch),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::file_not_found(), StatusCode::NOT_FOUND),
            (AppError::file_forbidden(), StatusCode::FORBIDDEN),
            (
                AppError::Conflict("dup".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Timeout("slow".to_string()),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                AppError::Upstream("s3".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::BatchTooLarge { count: 31, max: 30 };
        assert_eq!(err.to_string(), "Batch contains 31 files, maximum is 30");

        let err = ValidationError::InvalidContentType {
            content_type: "text/plain".to_string(),
            file_type: "image".to_string(),
        };
        assert!(err.to_string().contains("text/plain"));
    }
}
