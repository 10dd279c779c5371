use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::ordering::OrderingError;

/// Failures reported by a document store. Never retried here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Store is disconnected")]
    Disconnected,
}

impl From<OrderingError> for StoreError {
    fn from(err: OrderingError) -> Self {
        StoreError::Constraint(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn todo_not_found() -> Self {
        AppError::NotFound("Todo not found".to_string())
    }

    pub fn subtask_not_found() -> Self {
        AppError::NotFound("Subtask not found".to_string())
    }
}

/// Envelope shared by every JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(data: Option<T>, message: &str) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.to_string()),
            error: None,
        }
    }
}

impl ApiResponse<Value> {
    pub fn failure(error: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: false,
            data,
            message: None,
            error: Some(error.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiResponse::failure(msg, None)),
            AppError::Validation(messages) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::failure("Validation failed", Some(Value::from(messages))),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiResponse::failure(msg, None)),
            AppError::Store(StoreError::Constraint(msg)) => {
                (StatusCode::CONFLICT, ApiResponse::failure(msg, None))
            }
            AppError::Store(e) => {
                error!("store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::failure("Database error occurred", None),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
