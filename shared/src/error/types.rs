//! Error type and API error envelope

use super::kind::ErrorKind;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error with a stable kind and a human-readable message.
///
/// The message is safe to return to clients for `Validation`, `NotFound` and
/// `Conflict` kinds; `Dependency` and `Internal` messages are replaced by a
/// generic phrase at the HTTP boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// Stable category of the error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dependency, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> StatusCode {
        self.kind.http_status()
    }

    /// True when the message may be echoed back to the client verbatim.
    fn message_is_public(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("resource not found"),
            other => Self::dependency(format!("database error: {other}")),
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

/// JSON error envelope returned to clients.
///
/// `error` carries the HTTP reason phrase, `message` the human detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: kind.reason_phrase().to_string(),
            message: message.into(),
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();

        let message = if self.message_is_public() {
            self.message.clone()
        } else {
            tracing::error!(kind = %self.kind, message = %self.message, "request failed");
            match self.kind {
                ErrorKind::Dependency => "a downstream dependency is unavailable".to_string(),
                ErrorKind::Cancelled => "request cancelled".to_string(),
                _ => "internal server error".to_string(),
            }
        };

        let body = ErrorResponse {
            error: self.kind.reason_phrase().to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        assert_eq!(AppError::validation("x").kind, ErrorKind::Validation);
        assert_eq!(AppError::not_found("x").kind, ErrorKind::NotFound);
        assert_eq!(AppError::conflict("x").kind, ErrorKind::Conflict);
        assert_eq!(AppError::dependency("x").kind, ErrorKind::Dependency);
        assert_eq!(AppError::cancelled("x").kind, ErrorKind::Cancelled);
        assert_eq!(AppError::internal("x").kind, ErrorKind::Internal);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn envelope_uses_reason_phrase() {
        let body = ErrorResponse::new(ErrorKind::Conflict, "order already assigned");
        assert_eq!(body.error, "Conflict");
        assert_eq!(body.message, "order already assigned");
    }
}
