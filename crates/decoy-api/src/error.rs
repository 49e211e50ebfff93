//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use decoy_core::{CoreError, HandlerFailure};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Override handler failed: {0}")]
    Handler(#[from] HandlerFailure),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
            ApiError::Handler(failure) => {
                error!("Override handler failed: {}", failure);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
            ApiError::Core(e) => match e {
                CoreError::Validation(errors) => (StatusCode::BAD_REQUEST, errors.to_string()),
                CoreError::Precondition(msg) => (StatusCode::CONFLICT, msg.clone()),
            },
        };

        let body = axum::Json(json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": message,
        }));

        (status, body).into_response()
    }
}
