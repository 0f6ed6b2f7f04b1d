use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use skillswap_shared::SessionId;
use skillswap_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing or invalid access token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    /// `session_id` points at the record the request collided with.
    #[error("{message}")]
    Conflict {
        message: String,
        session_id: Option<SessionId>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            session_id: None,
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("Not found".into()),
            StoreError::Conflict(message) => Self::conflict(message),
            StoreError::Validation(message) => Self::BadRequest(message),
            e @ StoreError::InvalidTransition { .. } => Self::conflict(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Conflict { .. } => StatusCode::CONFLICT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                serde_json::json!({ "error": "Internal server error" })
            }
            ServerError::Conflict {
                message,
                session_id: Some(id),
            } => serde_json::json!({ "error": message, "sessionId": id }),
            other => serde_json::json!({ "error": other.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
