//! HTTP error types for the `yonote` server.
//!
//! Maps domain errors from `yonote-core` into HTTP responses. Every variant
//! produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`. Internal failures are logged in full and
//! reported to the client with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use yonote_core::error::{AdminError, LockoutError, NoteError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Authentication missing or invalid.
    Unauthorized(String),
    /// Authenticated (or anonymous) caller may not do this.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// Too many failed password attempts.
    Locked { remaining_secs: i64 },
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Locked { remaining_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "locked",
                crate::views::lockout_message(remaining_secs),
            ),
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<NoteError> for AppError {
    fn from(err: NoteError) -> Self {
        match err {
            NoteError::NotFound { .. } => Self::NotFound(err.to_string()),
            NoteError::InvalidKey { .. } | NoteError::AlreadyExists { .. } => {
                Self::BadRequest(err.to_string())
            }
            NoteError::KeySpaceExhausted { .. }
            | NoteError::Serialization { .. }
            | NoteError::Hashing { .. }
            | NoteError::Crypto(_)
            | NoteError::Storage(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<LockoutError> for AppError {
    fn from(err: LockoutError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::NotConfigured => Self::NotFound(err.to_string()),
            AdminError::InvalidPassword | AdminError::SessionNotFound | AdminError::Expired { .. } => {
                Self::Unauthorized(err.to_string())
            }
            AdminError::Serialization { .. } | AdminError::Storage(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Locked { remaining_secs: 5 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn domain_errors_map() {
        let not_found: AppError = NoteError::NotFound { key: "k".into() }.into();
        assert!(matches!(not_found, AppError::NotFound(_)));
        let bad: AppError = NoteError::InvalidKey { reason: "r".into() }.into();
        assert!(matches!(bad, AppError::BadRequest(_)));
        let unauth: AppError = AdminError::InvalidPassword.into();
        assert!(matches!(unauth, AppError::Unauthorized(_)));
        let disabled: AppError = AdminError::NotConfigured.into();
        assert!(matches!(disabled, AppError::NotFound(_)));
    }
}
