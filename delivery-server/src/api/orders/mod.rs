//! Order API Module

mod handler;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

/// Order router
pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", put(handler::update_status))
        .route("/{id}/auto-assign", post(handler::auto_assign))
        .route("/{id}/review", post(handler::create_review))
}
