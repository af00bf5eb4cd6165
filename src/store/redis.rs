//! Redis snapshot store.
//!
//! Snapshots live in one sorted set scored by `fetched_at` in milliseconds, so
//! `ZREVRANGE key 0 0` is the current rate and history is a range read.

use super::SnapshotStore;
use crate::error::{Error, Result};
use crate::serialization::{deserialize_from_store, serialize_for_store};
use crate::snapshot::RateSnapshot;
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 8;

/// Default sorted-set key.
pub const DEFAULT_SNAPSHOT_KEY: &str = "silver_rate:snapshots";

/// Configuration for the Redis store.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    /// Sorted-set key holding the snapshots.
    pub key: String,
    /// Keep at most this many snapshots; `None` keeps everything. Must not be 0.
    pub max_history: Option<usize>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            key: DEFAULT_SNAPSHOT_KEY.to_string(),
            max_history: Some(1_000),
        }
    }
}

impl RedisConfig {
    /// # Errors
    /// Returns `Error::ConfigError` for an empty key or a retention of 0,
    /// which would trim away every snapshot as soon as it is written.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::ConfigError("Redis snapshot key must not be empty".to_string()));
        }
        if self.max_history == Some(0) {
            return Err(Error::ConfigError(
                "max_history must be at least 1, use None to keep every snapshot".to_string(),
            ));
        }
        Ok(())
    }

    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Redis-backed [`SnapshotStore`] with connection pooling.
///
/// # Example
///
/// ```no_run
/// # use silver_rate_kit::store::{RedisConfig, RedisSnapshotStore, SnapshotStore};
/// # async fn example() -> silver_rate_kit::Result<()> {
/// let store = RedisSnapshotStore::new(RedisConfig::default()).await?;
/// let current = store.latest().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisSnapshotStore {
    pool: Pool,
    key: String,
    max_history: Option<usize>,
}

impl RedisSnapshotStore {
    /// Create a store from configuration.
    ///
    /// # Errors
    /// Returns `Err` if the config is invalid or pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        config.validate()?;

        let mut cfg = PoolConfig::from_url(config.connection_string());
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis snapshot store initialized: {}:{} (key {})",
            config.host, config.port, config.key
        );

        Ok(RedisSnapshotStore {
            pool,
            key: config.key,
            max_history: config.max_history,
        })
    }

    /// Create from a connection string with the default key and retention.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` when set.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let mut cfg = PoolConfig::from_url(conn_str);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis snapshot store initialized from connection string (pool size: {})",
            pool_size
        );

        let defaults = RedisConfig::default();
        Ok(RedisSnapshotStore {
            pool,
            key: defaults.key,
            max_history: defaults.max_history,
        })
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }

    async fn range_desc(&self, count: usize) -> Result<Vec<RateSnapshot>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection().await?;
        let stop = isize::try_from(count - 1).unwrap_or(isize::MAX);
        let entries: Vec<Vec<u8>> = conn.zrevrange(&self.key, 0, stop).await.map_err(|e| {
            Error::BackendError(format!("Redis ZREVRANGE failed for {}: {}", self.key, e))
        })?;

        entries
            .iter()
            .map(|bytes| deserialize_from_store(bytes))
            .collect()
    }
}

impl SnapshotStore for RedisSnapshotStore {
    async fn latest(&self) -> Result<Option<RateSnapshot>> {
        let snapshot = self.range_desc(1).await?.into_iter().next();
        debug!(
            "✓ Redis LATEST {} -> {}",
            self.key,
            if snapshot.is_some() { "HIT" } else { "EMPTY" }
        );
        Ok(snapshot)
    }

    async fn append(&self, snapshot: &RateSnapshot) -> Result<()> {
        let bytes = serialize_for_store(snapshot)?;
        let score = snapshot.fetched_at.timestamp_millis();
        let mut conn = self.connection().await?;

        conn.zadd::<_, _, _, ()>(&self.key, bytes, score)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Redis ZADD failed for {}: {}", self.key, e))
            })?;

        if let Some(max) = self.max_history {
            conn.zremrangebyrank::<_, ()>(&self.key, 0, retention_stop(max))
                .await
                .map_err(|e| {
                    Error::BackendError(format!("Redis ZREMRANGEBYRANK failed: {}", e))
                })?;
        }

        debug!(
            "✓ Redis APPEND {} @ {} ({})",
            snapshot.rate_per_gram, snapshot.fetched_at, snapshot.source
        );
        Ok(())
    }

    async fn history(&self, limit: usize) -> Result<Vec<RateSnapshot>> {
        self.range_desc(limit).await
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;

        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }
}

/// Last rank `ZREMRANGEBYRANK` removes so that the newest `keep` entries
/// survive. Never below one survivor.
fn retention_stop(keep: usize) -> isize {
    let keep = isize::try_from(keep.max(1)).unwrap_or(isize::MAX);
    -keep - 1
}
