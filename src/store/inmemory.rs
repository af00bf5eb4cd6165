//! In-memory snapshot store (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent appends. Entries are kept in their
//! encoded envelope form, the same bytes a durable store would hold.

use super::SnapshotStore;
use crate::error::Result;
use crate::serialization::{deserialize_from_store, serialize_for_store};
use crate::snapshot::RateSnapshot;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ordering key: fetch time in microseconds, then append sequence.
type EntryKey = (i64, u64);

/// Thread-safe in-memory snapshot store.
///
/// Clones share the same entries, so one store can be handed to several
/// providers in tests. Unbounded unless [`with_max_history`](Self::with_max_history)
/// is set, in which case the oldest snapshots are trimmed after each append.
///
/// # Example
///
/// ```no_run
/// use silver_rate_kit::store::{InMemorySnapshotStore, SnapshotStore};
/// use silver_rate_kit::{RateSnapshot, RateSource};
/// use rust_decimal::Decimal;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemorySnapshotStore::new();
///     let seed = RateSnapshot::new(Decimal::from(95), RateSource::Seed, chrono::Utc::now());
///     store.append(&seed).await?;
///
///     assert_eq!(store.latest().await?, Some(seed));
///     Ok(())
/// }
/// ```
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    entries: Arc<DashMap<EntryKey, Vec<u8>>>,
    sequence: Arc<AtomicU64>,
    max_history: Option<usize>,
}

impl InMemorySnapshotStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max` snapshots, newest by `fetched_at`. A value of 0
    /// is treated as 1 so an append never trims itself away.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = Some(max.max(1));
        self
    }

    pub fn max_history(&self) -> Option<usize> {
        self.max_history
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every snapshot.
    pub fn clear(&self) {
        self.entries.clear();
        warn!("⚠ InMemory snapshot store cleared");
    }

    fn sorted_keys_desc(&self) -> Vec<EntryKey> {
        let mut keys: Vec<EntryKey> = self.entries.iter().map(|e| *e.key()).collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));
        keys
    }

    fn trim(&self, keep: usize) {
        if self.entries.len() <= keep {
            return;
        }
        let expired = self.sorted_keys_desc().split_off(keep);
        for key in &expired {
            self.entries.remove(key);
        }
        debug!("✓ InMemory TRIM dropped {} snapshot(s)", expired.len());
    }

    fn decode(&self, key: &EntryKey) -> Result<Option<RateSnapshot>> {
        match self.entries.get(key) {
            Some(bytes) => deserialize_from_store(bytes.value()).map(Some),
            None => Ok(None),
        }
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    async fn latest(&self) -> Result<Option<RateSnapshot>> {
        let newest = self.entries.iter().map(|e| *e.key()).max();

        match newest {
            Some(key) => {
                let snapshot = self.decode(&key)?;
                debug!("✓ InMemory LATEST -> {:?}", key);
                Ok(snapshot)
            }
            None => {
                debug!("✓ InMemory LATEST -> EMPTY");
                Ok(None)
            }
        }
    }

    async fn append(&self, snapshot: &RateSnapshot) -> Result<()> {
        let bytes = serialize_for_store(snapshot)?;
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let key = (snapshot.fetched_at.timestamp_micros(), seq);

        self.entries.insert(key, bytes);
        debug!(
            "✓ InMemory APPEND {} @ {} ({})",
            snapshot.rate_per_gram, snapshot.fetched_at, snapshot.source
        );

        if let Some(max) = self.max_history {
            self.trim(max);
        }
        Ok(())
    }

    async fn history(&self, limit: usize) -> Result<Vec<RateSnapshot>> {
        let mut snapshots = Vec::with_capacity(limit.min(self.entries.len()));
        for key in self.sorted_keys_desc().into_iter().take(limit) {
            if let Some(snapshot) = self.decode(&key)? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }
}
