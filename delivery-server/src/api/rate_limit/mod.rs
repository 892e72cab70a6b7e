//! Rate limit status API Module

mod handler;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Rate limit router
pub fn router() -> Router<AppState> {
    Router::new().route("/api/rate-limit/status", get(handler::status))
}
