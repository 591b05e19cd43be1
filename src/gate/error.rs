//! Access gate errors and their client-visible mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::gate::secrets::SecretError;

/// Why a protected request did not get through.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("API key missing")]
    MissingCredential,

    #[error("API key does not match")]
    InvalidCredential,

    #[error("expected API key unavailable: {0}")]
    SecretUnavailable(#[from] SecretError),

    #[error("internal error ({correlation_id}): {message}")]
    Internal { correlation_id: Uuid, message: String },
}

impl GateError {
    /// Build an internal error and log its detail under a fresh correlation id.
    pub fn internal(message: impl Into<String>) -> Self {
        let correlation_id = Uuid::new_v4();
        let message = message.into();
        tracing::error!(correlation_id = %correlation_id, error = %message, "Internal error");
        GateError::Internal {
            correlation_id,
            message,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GateError::MissingCredential => StatusCode::UNAUTHORIZED,
            GateError::InvalidCredential => StatusCode::FORBIDDEN,
            GateError::SecretUnavailable(_) | GateError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show a client. Never carries internal detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            GateError::RateLimited => "Too many requests, please try again later.",
            GateError::MissingCredential => "API key required",
            GateError::InvalidCredential => "Invalid API key",
            GateError::SecretUnavailable(_) | GateError::Internal { .. } => {
                "Internal server error"
            }
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let body = match &self {
            GateError::Internal { correlation_id, .. } => serde_json::json!({
                "error": self.public_message(),
                "requestId": correlation_id,
            }),
            _ => serde_json::json!({ "error": self.public_message() }),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
