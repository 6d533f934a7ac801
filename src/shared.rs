use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::room::RoomService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
}

impl AppState {
    pub fn new(room_service: Arc<RoomService>) -> Self {
        Self { room_service }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Stored version moved on since the record was read. Recovered inside the
    /// join protocol; only escapes if a caller uses the store directly.
    #[error("Version conflict on {0}")]
    VersionConflict(String),

    #[error("Contention: {0}")]
    Contention(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::AlreadyExists(msg) => (StatusCode::CONFLICT, msg),
            AppError::VersionConflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Contention(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Persistence(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Persistence error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
