//! Redis access layer
//!
//! JSON value caching plus the atomic fixed-window counter used by the rate
//! limiter. All callers treat cache failures as soft: they log and move on.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use shared::error::{AppError, AppResult};

use crate::config::RedisConfig;
use crate::services::rate_limit::CounterStore;

/// Key prefixes shared across components.
pub const KEY_PREFIX_ORDER: &str = "order";
pub const KEY_PREFIX_COURIER: &str = "courier";
pub const KEY_PREFIX_STATS: &str = "stats";
pub const KEY_PREFIX_GEOCODE: &str = "geocode";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// INCR and first-touch EXPIRE executed as one atomic unit, so a crash can
/// never leave a counter without a TTL.
const INCR_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('TTL', KEYS[1])
return {count, ttl}
"#;

/// Cheap-to-clone Redis handle with JSON helpers.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    pub async fn connect(cfg: &RedisConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(cfg.url())?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to redis");
        Ok(Self { conn })
    }

    /// Build a namespaced cache key.
    pub fn key(prefix: &str, id: &str) -> String {
        format!("{prefix}:{id}")
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, raw, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for Cache {
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<(i64, Duration)> {
        let mut conn = self.conn.clone();
        let (count, ttl): (i64, i64) = redis::Script::new(INCR_WINDOW_SCRIPT)
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|err| AppError::dependency(format!("rate limiter incr failed: {err}")))?;

        let ttl = if ttl > 0 {
            Duration::from_secs(ttl as u64)
        } else {
            window
        };
        Ok((count, ttl))
    }

    async fn read(&self, key: &str) -> AppResult<Option<(i64, Duration)>> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn
            .get(key)
            .await
            .map_err(|err| AppError::dependency(format!("rate limiter read failed: {err}")))?;
        let Some(count) = count else {
            return Ok(None);
        };

        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|err| AppError::dependency(format!("rate limiter ttl failed: {err}")))?;
        let ttl = if ttl > 0 {
            Duration::from_secs(ttl as u64)
        } else {
            Duration::ZERO
        };
        Ok(Some((count, ttl)))
    }
}

#[cfg(test)]
mod tests {
    use super::Cache;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(Cache::key("order", "abc"), "order:abc");
        assert_eq!(Cache::key("geocode", "ff00"), "geocode:ff00");
    }
}
