//! HTTP surface
//!
//! Per-resource routers nested under `/api`, plus the unauthenticated health
//! probes. The rate-limit layer wraps the API routes only.

pub mod analytics;
pub mod couriers;
pub mod health;
pub mod middleware;
pub mod orders;
pub mod promo_codes;
pub mod rate_limit;
pub mod validate;

use axum::extract::FromRequest;
use axum::middleware as axum_middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::warn;
use uuid::Uuid;

use shared::error::AppError;
use shared::models::OrderStatus;

use crate::cache::{Cache, KEY_PREFIX_COURIER, KEY_PREFIX_ORDER};
use crate::state::AppState;

/// JSON body extractor whose rejection maps to the standard 400 envelope
/// instead of axum's default 422.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(orders::router())
        .merge(couriers::router())
        .merge(promo_codes::router())
        .merge(analytics::router())
        .merge(rate_limit::router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    Router::new()
        .merge(health::router())
        .merge(api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Post-commit bookkeeping shared by every assignment path: publish the
/// assignment events and drop the now-stale cache entries. Failures here are
/// logged, never surfaced.
pub(crate) async fn after_assignment(state: &AppState, order_id: Uuid, courier_id: Uuid) {
    if let Err(err) = state
        .producer
        .publish_courier_assigned(order_id, courier_id)
        .await
    {
        warn!(order_id = %order_id, error = %err, "failed to publish courier assigned event");
    }
    if let Err(err) = state
        .producer
        .publish_order_status_changed(
            order_id,
            OrderStatus::Created,
            OrderStatus::Accepted,
            Some(courier_id),
        )
        .await
    {
        warn!(order_id = %order_id, error = %err, "failed to publish order status changed event");
    }

    invalidate(state, KEY_PREFIX_ORDER, &order_id.to_string()).await;
    invalidate(state, KEY_PREFIX_COURIER, &courier_id.to_string()).await;
}

/// Best-effort cache invalidation.
pub(crate) async fn invalidate(state: &AppState, prefix: &str, id: &str) {
    let key = Cache::key(prefix, id);
    if let Err(err) = state.cache.delete(&key).await {
        warn!(key = %key, error = %err, "failed to invalidate cache entry");
    }
}
