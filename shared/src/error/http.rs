//! HTTP status code mapping for error kinds

use super::kind::ErrorKind;
use http::StatusCode;

impl ErrorKind {
    /// Get the HTTP status code for this error kind.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Dependency => StatusCode::SERVICE_UNAVAILABLE,
            // Nginx's "client closed request"; not in the IANA registry
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Reason phrase used in the `error` field of the response envelope.
    pub fn reason_phrase(&self) -> &'static str {
        self.http_status()
            .canonical_reason()
            .unwrap_or("Client Closed Request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        assert_eq!(ErrorKind::Validation.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::NotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Conflict.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorKind::Dependency.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ErrorKind::Cancelled.http_status().as_u16(), 499);
        assert_eq!(
            ErrorKind::Internal.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn reason_phrases() {
        assert_eq!(ErrorKind::Validation.reason_phrase(), "Bad Request");
        assert_eq!(ErrorKind::Conflict.reason_phrase(), "Conflict");
        assert_eq!(ErrorKind::Cancelled.reason_phrase(), "Client Closed Request");
    }
}
