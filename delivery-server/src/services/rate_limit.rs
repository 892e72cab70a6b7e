//! Fixed-window rate limiting
//!
//! Counters live in the key/value store behind the narrow [`CounterStore`]
//! trait; the window TTL is installed atomically with the first increment, so
//! a crash can never strand a counter without an expiry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use shared::error::AppResult;

use crate::config::RateLimitConfig;

/// Minimal counter capability the limiter needs from the key/value store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key`, installing `window` as its TTL on first
    /// touch. Returns the counter value and the remaining window.
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<(i64, Duration)>;

    /// Read the counter without mutating it. `None` when the key is absent.
    async fn read(&self, key: &str) -> AppResult<Option<(i64, Duration)>>;
}

/// Outcome of an `allow` check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

/// Non-mutating view of a client's window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitUsage {
    pub used: i64,
    pub remaining: i64,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Fixed-window counter per client key.
pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
    limit: i64,
    window: Duration,
    prefix: String,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, cfg: &RateLimitConfig) -> Self {
        if !cfg.enabled || cfg.requests <= 0 || cfg.window_seconds == 0 {
            return Self::disabled();
        }

        let prefix = if cfg.key_prefix.is_empty() {
            "ratelimit".to_string()
        } else {
            cfg.key_prefix.clone()
        };

        Self {
            store: Some(store),
            limit: cfg.requests,
            window: Duration::from_secs(cfg.window_seconds),
            prefix,
        }
    }

    /// A limiter that allows everything.
    pub fn disabled() -> Self {
        Self {
            store: None,
            limit: 0,
            window: Duration::from_secs(60),
            prefix: "ratelimit".to_string(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn window_seconds(&self) -> u64 {
        self.window.as_secs()
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key.replace(':', "_"))
    }

    /// Count this request against the client's window.
    pub async fn allow(&self, key: &str) -> AppResult<RateLimitDecision> {
        let Some(store) = &self.store else {
            return Ok(RateLimitDecision {
                allowed: true,
                remaining: self.limit,
                reset_at: Utc::now() + to_delta(self.window),
            });
        };

        let (count, ttl) = store.incr_window(&self.make_key(key), self.window).await?;

        Ok(RateLimitDecision {
            allowed: count <= self.limit,
            remaining: (self.limit - count).max(0),
            reset_at: Utc::now() + to_delta(ttl),
        })
    }

    /// Current window state without consuming a request.
    pub async fn usage(&self, key: &str) -> AppResult<RateLimitUsage> {
        let Some(store) = &self.store else {
            return Ok(RateLimitUsage {
                used: 0,
                remaining: self.limit,
                reset_at: None,
            });
        };

        match store.read(&self.make_key(key)).await? {
            None => Ok(RateLimitUsage {
                used: 0,
                remaining: self.limit,
                reset_at: None,
            }),
            Some((count, ttl)) => Ok(RateLimitUsage {
                used: count,
                remaining: (self.limit - count).max(0),
                reset_at: Some(Utc::now() + to_delta(ttl)),
            }),
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colons_in_client_keys_are_neutralized() {
        let limiter = RateLimiter::disabled();
        assert_eq!(limiter.make_key("::1"), "ratelimit:__1");
        assert_eq!(limiter.make_key("1.2.3.4"), "ratelimit:1.2.3.4");
    }

    #[tokio::test]
    async fn disabled_limiter_allows_everything() {
        let limiter = RateLimiter::disabled();
        let decision = limiter.allow("1.2.3.4").await.unwrap();
        assert!(decision.allowed);

        let usage = limiter.usage("1.2.3.4").await.unwrap();
        assert_eq!(usage.used, 0);
        assert!(usage.reset_at.is_none());
    }
}
