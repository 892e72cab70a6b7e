//! Shared types for the delivery platform
//!
//! Domain models and the unified error system used by the server crate.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorKind};
pub use serde::{Deserialize, Serialize};
