//! Health probe routes
//!
//! | Path              | Meaning                                            |
//! |-------------------|----------------------------------------------------|
//! | /health/liveness  | process is running                                 |
//! | /health/readiness | database, key/value store and broker all reachable |
//! | /health           | aggregate status with per-component detail         |

use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use shared::error::{AppError, AppResult};

use crate::db;
use crate::state::AppState;

/// Per-check deadline for the readiness probe.
const READINESS_TIMEOUT: Duration = Duration::from_secs(2);
/// Per-check deadline for the detailed health report.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Health router - public, no rate limiting.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/readiness", get(readiness))
        .route("/health/liveness", get(liveness))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: BTreeMap<&'static str, String>,
    version: &'static str,
    uptime: String,
}

/// Aggregated status with per-component detail.
async fn health(State(state): State<AppState>) -> Response {
    let mut services = BTreeMap::new();
    let mut healthy = true;

    for (name, result) in [
        ("database", check_database(&state, HEALTH_TIMEOUT).await),
        ("redis", check_redis(&state, HEALTH_TIMEOUT).await),
        ("kafka", check_kafka(&state, HEALTH_TIMEOUT).await),
    ] {
        match result {
            Ok(()) => {
                services.insert(name, "healthy".to_string());
            }
            Err(err) => {
                services.insert(name, format!("unhealthy: {}", err.message));
                healthy = false;
            }
        }
    }

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        services,
        version: env!("CARGO_PKG_VERSION"),
        uptime: uptime(&state),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response)).into_response()
}

/// Short-deadline readiness: any failing dependency makes us unready.
async fn readiness(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    check_database(&state, READINESS_TIMEOUT)
        .await
        .map_err(|_| AppError::dependency("database not ready"))?;
    check_redis(&state, READINESS_TIMEOUT)
        .await
        .map_err(|_| AppError::dependency("redis not ready"))?;
    check_kafka(&state, READINESS_TIMEOUT)
        .await
        .map_err(|_| AppError::dependency("kafka not ready"))?;

    Ok(Json(serde_json::json!({ "status": "ready" })))
}

/// Always OK while the process runs.
async fn liveness(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "uptime": uptime(&state),
    }))
}

fn uptime(state: &AppState) -> String {
    format!("{}s", state.started_at.elapsed().as_secs())
}

async fn check_database(state: &AppState, budget: Duration) -> AppResult<()> {
    tokio::time::timeout(budget, db::health(&state.pool))
        .await
        .map_err(|_| AppError::dependency("database check timed out"))?
        .map_err(|err| AppError::dependency(format!("database check failed: {err}")))
}

async fn check_redis(state: &AppState, budget: Duration) -> AppResult<()> {
    tokio::time::timeout(budget, state.cache.ping())
        .await
        .map_err(|_| AppError::dependency("redis check timed out"))?
        .map_err(|err| AppError::dependency(format!("redis check failed: {err}")))
}

/// Broker metadata fetch; requires at least one configured broker.
async fn check_kafka(state: &AppState, budget: Duration) -> AppResult<()> {
    if state.config.kafka.brokers.is_empty() {
        return Err(AppError::dependency("no brokers configured"));
    }

    let producer = state.producer.clone();
    tokio::task::spawn_blocking(move || producer.check_connectivity(budget))
        .await
        .map_err(|err| AppError::internal(format!("kafka check task failed: {err}")))?
}
