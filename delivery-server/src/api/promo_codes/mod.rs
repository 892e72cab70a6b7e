//! Promo code API Module

mod handler;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Promo code router
pub fn router() -> Router<AppState> {
    Router::new().nest("/api/promo-codes", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route(
            "/{code}",
            get(handler::get_by_code)
                .put(handler::update)
                .delete(handler::remove),
        )
}
