//! Rate limiter for preventing brute force attacks
//!
//! A sliding-window log per key: an attempt is admitted when fewer than
//! `max_attempts` admitted attempts fall inside the trailing window. Windows
//! live in process memory by default; the Redis backend shares them between
//! API instances.

use anyhow::Result;
use chrono::Utc;
use common::cache::RedisPool;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Number of tracked keys above which stale windows are swept
const SWEEP_THRESHOLD: usize = 1024;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed per window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 900, // 15 minutes
        }
    }
}

impl RateLimiterConfig {
    fn window_millis(&self) -> i64 {
        i64::try_from(self.window_seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<Mutex<HashMap<String, VecDeque<i64>>>>),
    Redis(RedisPool),
}

/// Rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    /// Rate limiter configuration
    config: RateLimiterConfig,
    backend: Backend,
}

impl RateLimiter {
    /// Create a new in-process rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Create a rate limiter whose windows are stored in Redis
    pub fn with_redis(config: RateLimiterConfig, redis_pool: RedisPool) -> Self {
        Self {
            config,
            backend: Backend::Redis(redis_pool),
        }
    }

    /// Check if `key` may make another attempt now, recording it if so
    pub async fn is_allowed(&self, key: &str) -> Result<bool> {
        self.is_allowed_at(key, Utc::now().timestamp_millis()).await
    }

    /// Check if `key` may make another attempt at `now_millis`
    pub async fn is_allowed_at(&self, key: &str, now_millis: i64) -> Result<bool> {
        let allowed = match &self.backend {
            Backend::Memory(entries) => {
                let mut entries = entries.lock().await;
                self.admit(&mut entries, key, now_millis)
            }
            Backend::Redis(pool) => {
                pool.admit_in_window(
                    &format!("rate_limit:{}", key),
                    now_millis,
                    self.config.window_millis(),
                    self.config.max_attempts,
                )
                .await?
            }
        };

        if !allowed {
            warn!(
                "Rate limit exceeded for key {} ({} attempts per {} seconds)",
                key, self.config.max_attempts, self.config.window_seconds
            );
        }

        Ok(allowed)
    }

    fn admit(
        &self,
        entries: &mut HashMap<String, VecDeque<i64>>,
        key: &str,
        now_millis: i64,
    ) -> bool {
        let window_start = now_millis.saturating_sub(self.config.window_millis());

        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, attempts| attempts.back().is_some_and(|last| *last > window_start));
            info!("Swept rate limiter windows, {} keys remain", entries.len());
        }

        let attempts = entries.entry(key.to_string()).or_default();
        while attempts.front().is_some_and(|first| *first <= window_start) {
            attempts.pop_front();
        }

        if attempts.len() >= self.config.max_attempts as usize {
            return false;
        }

        attempts.push_back(now_millis);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    #[tokio::test]
    async fn test_sixth_attempt_in_window_is_rejected() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());

        for i in 0..5 {
            assert!(limiter.is_allowed_at("10.0.0.1", i * MINUTE).await.unwrap());
        }
        assert!(!limiter.is_allowed_at("10.0.0.1", 6 * MINUTE).await.unwrap());
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());

        for i in 0..5 {
            assert!(limiter.is_allowed_at("10.0.0.1", i * MINUTE).await.unwrap());
        }
        assert!(!limiter.is_allowed_at("10.0.0.1", 14 * MINUTE).await.unwrap());

        // The attempt at minute 0 leaves the window after 15 minutes
        assert!(limiter.is_allowed_at("10.0.0.1", 15 * MINUTE).await.unwrap());
        assert!(!limiter.is_allowed_at("10.0.0.1", 15 * MINUTE + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window_seconds: 60,
        });

        assert!(limiter.is_allowed_at("10.0.0.1", 0).await.unwrap());
        assert!(!limiter.is_allowed_at("10.0.0.1", 1).await.unwrap());
        assert!(limiter.is_allowed_at("10.0.0.2", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_windows() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 2,
            window_seconds: 60,
        });
        let clone = limiter.clone();

        assert!(limiter.is_allowed_at("k", 0).await.unwrap());
        assert!(clone.is_allowed_at("k", 1).await.unwrap());
        assert!(!limiter.is_allowed_at("k", 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_keys_are_swept() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window_seconds: 1,
        });

        for i in 0..=SWEEP_THRESHOLD {
            limiter.is_allowed_at(&format!("key-{}", i), 0).await.unwrap();
        }
        limiter.is_allowed_at("late", 10_000).await.unwrap();

        if let Backend::Memory(entries) = &limiter.backend {
            assert_eq!(entries.lock().await.len(), 1);
        }
    }
}
