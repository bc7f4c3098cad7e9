/// Redis-backed key-value cache
///
/// Holds short-lived counters shared between server instances (rate limits,
/// tracking dedupe windows).

use crate::config::CacheConfig;
use crate::error::{AppError, AppResult};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, info, warn};

/// Redis cache client
#[derive(Clone)]
pub struct CacheClient {
    connection: ConnectionManager,
    key_prefix: String,
}

impl CacheClient {
    /// Create a new cache client
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        if !config.enabled {
            return Err(AppError::Cache(
                "Cache is disabled, cannot create client".to_string(),
            ));
        }

        info!("Connecting to Redis at {}", config.redis_url);

        let client = Client::open(config.redis_url.as_str()).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            AppError::Cache(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Build a cache key with prefix
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Read a counter, 0 when absent
    pub async fn get_counter(&self, key: &str) -> AppResult<u64> {
        let cache_key = self.build_key(key);

        let mut conn = self.connection.clone();
        let value: Option<u64> = conn.get(&cache_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", cache_key, e);
            AppError::Cache(format!("Cache get failed: {}", e))
        })?;

        Ok(value.unwrap_or(0))
    }

    /// Increment a counter, setting its TTL when it is created
    pub async fn increment(&self, key: &str, ttl_secs: u64) -> AppResult<u64> {
        let cache_key = self.build_key(key);

        debug!("Cache INCR: {} (TTL: {}s)", cache_key, ttl_secs);

        let mut conn = self.connection.clone();

        let count: u64 = conn.incr(&cache_key, 1).await.map_err(|e| {
            warn!("Redis INCR failed for {}: {}", cache_key, e);
            AppError::Cache(format!("Cache increment failed: {}", e))
        })?;

        if count == 1 {
            conn.expire::<_, ()>(&cache_key, ttl_secs as i64)
                .await
                .map_err(|e| {
                    warn!("Redis EXPIRE failed for {}: {}", cache_key, e);
                    AppError::Cache(format!("Cache expire failed: {}", e))
                })?;
        }

        Ok(count)
    }

    /// Round-trip check used by readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Redis ping failed: {}", e)))?;
        Ok(())
    }
}
