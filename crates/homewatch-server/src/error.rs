// HTTP error mapping.
//
// Ingestion failures answer `{success: false, error}`; query misses answer
// `{error}`. Nothing panics across the handler boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use homewatch_core::CoreError;

/// Message returned for any event lookup miss.
pub const EVENT_NOT_FOUND: &str = "Événement non trouvé";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::BadRequest(message),
            CoreError::NotFound { .. } => Self::NotFound(EVENT_NOT_FOUND.into()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::NotFound(message) => json!({ "error": message }),
            Self::BadRequest(message) => json!({ "success": false, "error": message }),
            Self::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                json!({ "success": false, "error": message })
            }
        };
        (status, Json(body)).into_response()
    }
}
