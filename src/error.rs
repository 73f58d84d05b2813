// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 400 Bad Request: malformed or out-of-range input
    Validation(String),

    // 401 Unauthorized: missing or malformed tenant context
    Unauthorized(String),

    // 404 Not Found: entity absent within the caller's college
    NotFound(String),

    // 409 Conflict: state invariant violation (duplicate enrollment,
    // double booking, resolved revaluation, illegal transition)
    Conflict(String),

    // 409 Conflict: derived artifact requested before its inputs exist
    NotAllocated(String),

    // 422 Unprocessable Entity: demand exceeds available capacity
    Capacity(String),

    // 500 Internal Server Error
    Store(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON envelope with the appropriate HTTP status.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotAllocated(msg) => (StatusCode::CONFLICT, msg),
            AppError::Capacity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Store(msg) => {
                tracing::error!("store error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
            "status": "error",
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::Store`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}
