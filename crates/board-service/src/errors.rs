//! Board service error types.
//!
//! `BoardError` is what callers of the registry and session handles see.
//! It maps to HTTP status codes via the `IntoResponse` impl; client-facing
//! messages never carry internal details.
//!
//! `DeliveryFailure` is internal to the session actor. It is logged and
//! counted but never leaves the actor.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Board service error type.
///
/// Maps to HTTP status codes:
/// - `SessionNotFound`: 404 Not Found
/// - `DuplicateSession`: 409 Conflict
/// - `SessionClosed`: 410 Gone
/// - `Draining`: 503 Service Unavailable
/// - `BadRequest`: 400 Bad Request
/// - `Internal`: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum BoardError {
    /// No session is registered under this id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The generated session id collided with a live session.
    #[error("Session already exists")]
    DuplicateSession,

    /// The session actor behind this handle has stopped.
    #[error("Session is closed")]
    SessionClosed,

    /// The registry is shutting down and not accepting new sessions.
    #[error("Registry is draining")]
    Draining,

    /// Malformed input at the HTTP boundary.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            BoardError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            BoardError::DuplicateSession => StatusCode::CONFLICT,
            BoardError::SessionClosed => StatusCode::GONE,
            BoardError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            BoardError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BoardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            BoardError::SessionNotFound(_) => "Session not found".to_string(),
            BoardError::DuplicateSession => "Session already exists, please retry".to_string(),
            BoardError::SessionClosed => "Session has ended".to_string(),
            BoardError::Draining => "Server is shutting down".to_string(),
            BoardError::BadRequest(reason) => reason.clone(),
            BoardError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            BoardError::SessionNotFound(_) => "NOT_FOUND",
            BoardError::DuplicateSession => "CONFLICT",
            BoardError::SessionClosed => "SESSION_CLOSED",
            BoardError::Draining => "SERVICE_UNAVAILABLE",
            BoardError::BadRequest(_) => "BAD_REQUEST",
            BoardError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        if let BoardError::Internal(detail) = &self {
            tracing::error!(target: "board.http", error = %detail, "Internal error");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.client_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Why a single member could not be handed a message.
///
/// Absorbed by the session actor: the member is dropped from the roster and
/// fan-out continues for everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// The member's receiving half is gone (connection already closed).
    #[error("client sink closed")]
    Closed,

    /// The member's outbound buffer is full (consumer too slow).
    #[error("client sink full")]
    Lagging,
}

impl DeliveryFailure {
    /// Returns the failure as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeliveryFailure::Closed => "closed",
            DeliveryFailure::Lagging => "lagging",
        }
    }
}
