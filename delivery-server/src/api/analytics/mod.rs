//! Analytics API Module

mod handler;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Analytics router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/kpi", get(handler::kpi))
        .route("/api/analytics/couriers", get(handler::couriers))
}
