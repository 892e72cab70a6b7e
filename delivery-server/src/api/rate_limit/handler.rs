//! Rate limit status handler

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;

use shared::error::AppResult;

use crate::api::middleware::client_ip;
use crate::state::AppState;

/// Current client's counter without consuming a request.
pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> AppResult<Json<serde_json::Value>> {
    let limiter = &state.rate_limiter;

    if !limiter.enabled() {
        return Ok(Json(serde_json::json!({ "enabled": false })));
    }

    let key = client_ip(&headers, Some(addr));
    let usage = limiter.usage(&key).await?;

    let mut body = serde_json::json!({
        "enabled": true,
        "limit": limiter.limit(),
        "window_seconds": limiter.window_seconds(),
        "used": usage.used,
        "remaining": usage.remaining,
        "key": key,
    });
    if let Some(reset_at) = usage.reset_at {
        body["reset_at"] = serde_json::json!(reset_at.to_rfc3339());
    }

    Ok(Json(body))
}
