//! Append-only snapshot stores.

use crate::error::Result;
use crate::snapshot::RateSnapshot;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemorySnapshotStore;
#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisSnapshotStore};

/// Durable, time-ordered store of rate snapshots.
///
/// Snapshots are only ever appended. The current rate is whatever
/// [`latest`](SnapshotStore::latest) returns: the snapshot with the greatest
/// `fetched_at`, ties going to the one appended last.
///
/// **IMPORTANT:** All methods take `&self`; implementations use interior
/// mutability or external storage so concurrent requests can share one store.
///
/// **ASYNC:** All methods are async and must be awaited.
#[allow(async_fn_in_trait)]
pub trait SnapshotStore: Send + Sync {
    /// Most recent snapshot, `Ok(None)` if the store is empty.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or the entry cannot be decoded.
    async fn latest(&self) -> Result<Option<RateSnapshot>>;

    /// Persist a new snapshot.
    ///
    /// # Errors
    /// Returns `Err` if the write fails.
    async fn append(&self, snapshot: &RateSnapshot) -> Result<()>;

    /// Up to `limit` snapshots, newest first.
    ///
    /// # Errors
    /// Returns `Err` if not implemented or the read fails.
    async fn history(&self, limit: usize) -> Result<Vec<RateSnapshot>> {
        let _ = limit;
        Err(crate::error::Error::NotImplemented(
            "history not implemented for this store".to_string(),
        ))
    }

    /// Health check for readiness endpoints.
    ///
    /// # Errors
    /// Returns `Err` if the store is not accessible.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
