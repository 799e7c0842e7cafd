use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input; the operation never started.
    #[error("{0}")]
    BadRequest(String),

    /// The resolved identity lacks the required visibility or role.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Structured upstream failure; status and detail are the registry's own.
    #[error("registry: {detail}")]
    Registry { status: StatusCode, detail: String },

    /// Storage collaborator failure. The response body stays generic so the
    /// persistence layer never leaks through the API.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Manifest or compatibility blob could not be decoded.
    #[error("failed to decode manifest: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Structured { status, detail } => AppError::Registry { status, detail },
            RegistryError::Opaque(cause) => AppError::Internal(cause.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("generating response for AppError: {self:?}");

        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::Registry { status, detail } => (*status, detail.clone()),
            Self::Storage(_) | Self::Decode(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
