//! Courier API Module

mod handler;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

/// Courier router
pub fn router() -> Router<AppState> {
    Router::new().nest("/api/couriers", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/available", get(handler::available))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", put(handler::update_status))
        .route("/{id}/assign", post(handler::assign))
        .route("/{id}/reviews", get(handler::reviews))
}
