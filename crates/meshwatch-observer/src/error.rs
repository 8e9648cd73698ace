//! Error types for the observer HTTP layer.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meshwatch_core::Rejection;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The batch body was not `{"messages": [...]}`.
    #[error("Invalid batch format")]
    InvalidBatch,

    /// A single submitted record could not be applied.
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),

    /// A required request field was missing or malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The subscriber limit has been reached.
    #[error("Server at capacity")]
    AtCapacity,

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidBatch | Self::Rejected(_) | Self::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::AtCapacity => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
