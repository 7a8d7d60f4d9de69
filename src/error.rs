//! Failure classes surfaced by the HTTP handlers and the response envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

/// Uniform body: `{"success": true, "data": ...}` or
/// `{"success": false, "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

impl Envelope<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A path parameter could not be coerced to the type the route needs.
    #[error("{0}")]
    InvalidInput(String),

    /// Storage or file access failed. Only `message` reaches the client.
    #[error("{message}")]
    Internal {
        message: &'static str,
        cause: anyhow::Error,
    },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `result.map_err(internal("Failed to fetch lessons"))`
pub fn internal(message: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |cause| AppError::Internal { message, cause }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal { message, cause } => error!(error = ?cause, "{message}"),
            other => debug!(%status, "{other}"),
        }
        (status, Json(Envelope::<()>::failure(self.to_string()))).into_response()
    }
}
