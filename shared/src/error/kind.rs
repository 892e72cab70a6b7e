//! Stable error categories
//!
//! Every error surfaced by a core component carries one of these kinds.
//! Handlers map kinds to HTTP status codes; the kinds themselves are
//! language- and transport-neutral.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied data is wrong (bad coordinates, unknown enum value,
    /// amount out of range, ...)
    Validation,
    /// Referenced entity does not exist
    NotFound,
    /// State violates a precondition (bad transition, already assigned,
    /// duplicate, expired promo, unavailable courier, ...)
    Conflict,
    /// A downstream collaborator (database, key/value store, broker,
    /// geocoder) failed
    Dependency,
    /// The caller's deadline elapsed
    Cancelled,
    /// Any other, non-recoverable error
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Dependency => "dependency",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
