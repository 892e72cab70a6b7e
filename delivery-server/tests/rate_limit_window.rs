//! Fixed-window limiter behavior over an in-memory counter store with a
//! controllable clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use delivery_server::config::RateLimitConfig;
use delivery_server::services::rate_limit::{CounterStore, RateLimiter};
use shared::error::AppResult;

/// Counter store with virtual time: `fast_forward` expires windows without
/// sleeping.
#[derive(Default)]
struct MemoryCounterStore {
    now_secs: AtomicU64,
    entries: Mutex<HashMap<String, (i64, u64)>>,
}

impl MemoryCounterStore {
    fn fast_forward(&self, secs: u64) {
        self.now_secs.fetch_add(secs, Ordering::SeqCst);
    }

    fn now(&self) -> u64 {
        self.now_secs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<(i64, Duration)> {
        let now = self.now();
        let mut entries = self.entries.lock().unwrap();

        let entry = entries
            .entry(key.to_string())
            .and_modify(|(count, expires_at)| {
                if *expires_at <= now {
                    *count = 0;
                    *expires_at = now + window.as_secs();
                }
            })
            .or_insert((0, now + window.as_secs()));

        entry.0 += 1;
        Ok((entry.0, Duration::from_secs(entry.1.saturating_sub(now))))
    }

    async fn read(&self, key: &str) -> AppResult<Option<(i64, Duration)>> {
        let now = self.now();
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(count, expires_at)| (*count, Duration::from_secs(expires_at - now))))
    }
}

fn limiter(store: Arc<MemoryCounterStore>, requests: i64, window_seconds: u64) -> RateLimiter {
    RateLimiter::new(
        store,
        &RateLimitConfig {
            enabled: true,
            requests,
            window_seconds,
            key_prefix: "ratelimit".to_string(),
        },
    )
}

#[tokio::test]
async fn limit_of_two_allows_two_then_rejects() {
    let store = Arc::new(MemoryCounterStore::default());
    let limiter = limiter(store.clone(), 2, 60);

    let first = limiter.allow("1.2.3.4").await.unwrap();
    assert!(first.allowed);
    assert_eq!(first.remaining, 1);

    let second = limiter.allow("1.2.3.4").await.unwrap();
    assert!(second.allowed);
    assert_eq!(second.remaining, 0);

    let third = limiter.allow("1.2.3.4").await.unwrap();
    assert!(!third.allowed);
    assert_eq!(third.remaining, 0);
}

#[tokio::test]
async fn window_expiry_admits_the_next_request() {
    let store = Arc::new(MemoryCounterStore::default());
    let limiter = limiter(store.clone(), 2, 60);

    for _ in 0..3 {
        let _ = limiter.allow("1.2.3.4").await.unwrap();
    }
    assert!(!limiter.allow("1.2.3.4").await.unwrap().allowed);

    store.fast_forward(61);

    let after = limiter.allow("1.2.3.4").await.unwrap();
    assert!(after.allowed);
    assert_eq!(after.remaining, 1);
}

#[tokio::test]
async fn clients_are_counted_independently() {
    let store = Arc::new(MemoryCounterStore::default());
    let limiter = limiter(store.clone(), 1, 60);

    assert!(limiter.allow("1.2.3.4").await.unwrap().allowed);
    assert!(!limiter.allow("1.2.3.4").await.unwrap().allowed);
    assert!(limiter.allow("5.6.7.8").await.unwrap().allowed);
}

#[tokio::test]
async fn usage_reads_without_consuming() {
    let store = Arc::new(MemoryCounterStore::default());
    let limiter = limiter(store.clone(), 5, 60);

    let fresh = limiter.usage("1.2.3.4").await.unwrap();
    assert_eq!(fresh.used, 0);
    assert_eq!(fresh.remaining, 5);
    assert!(fresh.reset_at.is_none());

    let _ = limiter.allow("1.2.3.4").await.unwrap();
    let _ = limiter.allow("1.2.3.4").await.unwrap();

    let usage = limiter.usage("1.2.3.4").await.unwrap();
    assert_eq!(usage.used, 2);
    assert_eq!(usage.remaining, 3);
    assert!(usage.reset_at.is_some());

    // reading twice must not change the counter
    let again = limiter.usage("1.2.3.4").await.unwrap();
    assert_eq!(again.used, 2);
}
