//! Redis cache module
//!
//! This module provides the Redis connection used when several API
//! instances must share their rate-limit windows.

use anyhow::Result;
use redis::{AsyncCommands, Client};
use tracing::info;
use uuid::Uuid;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Record an attempt in the sliding window stored at `key`.
    ///
    /// The window is a sorted set scored by millisecond timestamps. The
    /// attempt is added first and withdrawn again when it pushes the window
    /// over `limit`, so concurrent instances never admit more than `limit`.
    pub async fn admit_in_window(
        &self,
        key: &str,
        now_millis: i64,
        window_millis: i64,
        limit: u32,
    ) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let member = format!("{}-{}", now_millis, Uuid::new_v4());
        let cutoff = now_millis - window_millis;
        let window_seconds = (window_millis / 1000).max(1);

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(key, i64::MIN, cutoff)
            .ignore()
            .zadd(key, &member, now_millis)
            .ignore()
            .zcard(key)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > u64::from(limit) {
            let _: u64 = conn.zrem(key, &member).await?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
