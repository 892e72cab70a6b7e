//! Unified error system for the delivery platform
//!
//! This module provides the error handling used across all components:
//! - [`ErrorKind`]: stable error categories mapped to HTTP status codes
//! - [`AppError`]: error type with a kind and a human-readable message
//! - [`ErrorResponse`]: the JSON envelope returned to clients
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorKind};
//!
//! let err = AppError::conflict("invalid order status transition");
//! assert_eq!(err.kind, ErrorKind::Conflict);
//! assert_eq!(err.http_status().as_u16(), 409);
//! ```

mod http;
mod kind;
mod types;

pub use kind::ErrorKind;
pub use types::{AppError, AppResult, ErrorResponse};
