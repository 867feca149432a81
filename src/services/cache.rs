//! Redis read-through cache for listing details and profiles.
//!
//! Caching is optional: without `REDIS_URL` every lookup is a miss and
//! writes are no-ops. Redis failures are logged and treated the same way,
//! so the store stays the source of truth.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct RedisCache {
    conn: Option<ConnectionManager>,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            conn: Some(conn),
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    /// A cache that never hits.
    pub fn disabled() -> Self {
        Self {
            conn: None,
            default_ttl: Duration::from_secs(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;

        let hit = match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = key, error = %e, "Failed to deserialize cached value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = key, error = %e, "Redis get error");
                None
            }
        };

        tracing::Span::current().record("cache_hit", hit.is_some());
        debug!(key = key, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Store `value` under `key` with the default TTL. Errors are logged, not returned.
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };

        let ttl = self.default_ttl.as_secs().max(1);
        if let Err(e) = conn.set_ex::<_, _, ()>(key, data, ttl).await {
            warn!(key = key, error = %e, "Redis set error");
        } else {
            debug!(key = key, ttl_secs = ttl, "Cached value");
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };

        if let Err(e) = conn.del::<_, i32>(key).await {
            warn!(key = key, error = %e, "Redis delete error");
        }
    }

    /// `None` when caching is disabled.
    pub async fn health_check(&self) -> Option<bool> {
        let mut conn = self.conn.clone()?;
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        Some(pong.is_ok())
    }
}

/// Cache key builders
pub mod keys {
    use uuid::Uuid;

    pub fn listing(listing_id: Uuid) -> String {
        format!("listing:{}", listing_id)
    }

    pub fn profile(user_id: Uuid) -> String {
        format!("profile:user:{}", user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = RedisCache::disabled();
        assert!(!cache.is_enabled());
        cache.set("listing:1", &42).await;
        assert_eq!(cache.get::<i32>("listing:1").await, None);
        assert_eq!(cache.health_check().await, None);
    }
}
