/// Rate limiting
///
/// Two mechanisms live here:
/// - `FixedWindowLimiter`: per-(identifier, action) counters reset every window,
///   used by public view/click tracking.
/// - `global`: a governor-based per-IP request limiter applied as middleware.

pub mod global;

pub use global::{rate_limit_middleware, RequestRateLimiter};

use crate::cache::CacheClient;
use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage for expiring counters
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value of a counter (0 when absent or expired)
    async fn get(&self, key: &str) -> AppResult<u64>;

    /// Increment a counter, creating it with `ttl` when absent. Returns the new value.
    async fn increment(&self, key: &str, ttl: Duration) -> AppResult<u64>;

    /// Drop expired counters. Returns how many were removed.
    async fn purge_expired(&self) -> AppResult<usize>;
}

/// In-process counter store
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, (u64, Instant)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> AppResult<u64> {
        let entries = self.entries.lock().await;
        Ok(match entries.get(key) {
            Some((count, expires_at)) if *expires_at > Instant::now() => *count,
            _ => 0,
        })
    }

    async fn increment(&self, key: &str, ttl: Duration) -> AppResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert((0, now + ttl));
        if entry.1 <= now {
            *entry = (0, now + ttl);
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn purge_expired(&self) -> AppResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before - entries.len())
    }
}

/// Counter store shared through Redis
pub struct RedisCounterStore {
    cache: CacheClient,
}

impl RedisCounterStore {
    pub fn new(cache: CacheClient) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> AppResult<u64> {
        self.cache.get_counter(key).await
    }

    async fn increment(&self, key: &str, ttl: Duration) -> AppResult<u64> {
        self.cache.increment(key, ttl.as_secs().max(1)).await
    }

    async fn purge_expired(&self) -> AppResult<usize> {
        // Redis expires keys on its own
        Ok(0)
    }
}

/// Fixed-window limiter over a [`CounterStore`]
#[derive(Clone)]
pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Check and count one action.
    ///
    /// Returns `true` when `identifier` already performed `action` `limit` times
    /// in the current window. A blocked call does not count against the window.
    /// Store failures fail open.
    pub async fn is_rate_limited(
        &self,
        identifier: &str,
        action: &str,
        limit: u64,
        window: Duration,
    ) -> bool {
        let key = Self::window_key(identifier, action, window);

        let count = match self.store.get(&key).await {
            Ok(count) => count,
            Err(e) => {
                warn!(key = %key, error = %e, "Rate limit store read failed, allowing");
                return false;
            }
        };

        if count >= limit {
            debug!(key = %key, count, limit, "Rate limit reached");
            return true;
        }

        if let Err(e) = self.store.increment(&key, window).await {
            warn!(key = %key, error = %e, "Rate limit store increment failed");
        }

        false
    }

    /// Access to the backing store (for maintenance jobs)
    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Time left until the current `window` rolls over
    pub fn window_remaining(window: Duration) -> Duration {
        let window_secs = window.as_secs().max(1);
        Duration::from_secs(window_secs - unix_now() % window_secs)
    }

    fn window_key(identifier: &str, action: &str, window: Duration) -> String {
        let window_secs = window.as_secs().max(1);
        format!("ratelimit:{}:{}:{}", action, identifier, unix_now() / window_secs)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> FixedWindowLimiter {
        FixedWindowLimiter::new(Arc::new(MemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_allows_limit_then_blocks() {
        let limiter = limiter();
        let window = Duration::from_secs(300);

        for _ in 0..10 {
            assert!(!limiter.is_rate_limited("203.0.113.7:p1", "profile_view", 10, window).await);
        }
        assert!(limiter.is_rate_limited("203.0.113.7:p1", "profile_view", 10, window).await);
        assert!(limiter.is_rate_limited("203.0.113.7:p1", "profile_view", 10, window).await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            assert!(!limiter.is_rate_limited("a", "click", 3, window).await);
        }
        assert!(limiter.is_rate_limited("a", "click", 3, window).await);

        // Different identifier or action has its own counter
        assert!(!limiter.is_rate_limited("b", "click", 3, window).await);
        assert!(!limiter.is_rate_limited("a", "view", 3, window).await);
    }

    #[test]
    fn test_window_remaining_is_within_window() {
        let remaining = FixedWindowLimiter::window_remaining(Duration::from_secs(300));
        assert!(remaining >= Duration::from_secs(1));
        assert!(remaining <= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_zero_limit_always_blocks() {
        let limiter = limiter();
        assert!(limiter.is_rate_limited("x", "y", 0, Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("k", Duration::from_millis(20)).await.unwrap(), 1);
        assert_eq!(store.increment("k", Duration::from_millis(20)).await.unwrap(), 2);
        assert_eq!(store.get("k").await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), 0);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.increment("k", Duration::from_secs(5)).await.unwrap(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn get(&self, _key: &str) -> AppResult<u64> {
            Err(crate::error::AppError::Cache("down".to_string()))
        }
        async fn increment(&self, _key: &str, _ttl: Duration) -> AppResult<u64> {
            Err(crate::error::AppError::Cache("down".to_string()))
        }
        async fn purge_expired(&self) -> AppResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let limiter = FixedWindowLimiter::new(Arc::new(FailingStore));
        for _ in 0..5 {
            assert!(!limiter.is_rate_limited("ip", "view", 1, Duration::from_secs(60)).await);
        }
    }
}
