//! API middleware: fixed-window rate limiting and client identification.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use shared::error::{AppError, ErrorResponse};

use crate::state::AppState;

/// Count the request against the client's window and stamp the
/// `X-RateLimit-*` headers on whatever response goes out.
pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let limiter = state.rate_limiter.clone();
    if !limiter.enabled() {
        return next.run(request).await;
    }

    let key = client_ip(request.headers(), Some(addr));
    let decision = match limiter.allow(&key).await {
        Ok(decision) => decision,
        Err(err) => {
            error!(error = %err, "rate limiter failed");
            return AppError::internal("rate limiter error").into_response();
        }
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "Too Many Requests".to_string(),
                message: "rate limit exceeded".to_string(),
            }),
        )
            .into_response()
    };

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.limit()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(decision.reset_at.timestamp()),
    );

    response
}

/// Client identity for rate limiting: `X-Real-IP`, else the first
/// `X-Forwarded-For` hop, else the peer address.
pub fn client_ip(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }

    match addr {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:5123".parse().unwrap())
    }

    #[test]
    fn prefers_x_real_ip() {
        let map = headers(&[
            ("x-real-ip", "1.2.3.4"),
            ("x-forwarded-for", "5.6.7.8, 9.9.9.9"),
        ]);
        assert_eq!(client_ip(&map, peer()), "1.2.3.4");
    }

    #[test]
    fn falls_back_to_first_forwarded_hop() {
        let map = headers(&[("x-forwarded-for", " 5.6.7.8 , 9.9.9.9")]);
        assert_eq!(client_ip(&map, peer()), "5.6.7.8");
    }

    #[test]
    fn falls_back_to_peer_address() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.0.0.9");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
