//! Postcard encoding of stored snapshots inside a versioned envelope.
//!
//! Every entry a [`SnapshotStore`](crate::store::SnapshotStore) writes has this layout:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "SLVR"              u32                postcard::to_allocvec(T)
//! ```
//!
//! Magic and version are checked on every read. A store entry written by an
//! older schema is reported as [`Error::VersionMismatch`] and the provider
//! treats it like an unreadable store.
//!
//! # Example
//!
//! ```rust
//! use silver_rate_kit::serialization::{deserialize_from_store, serialize_for_store};
//! use silver_rate_kit::{RateSnapshot, RateSource};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> silver_rate_kit::Result<()> {
//! let snapshot = RateSnapshot::new(Decimal::new(9512, 2), RateSource::External, chrono::Utc::now());
//!
//! let bytes = serialize_for_store(&snapshot)?;
//! let decoded: RateSnapshot = deserialize_from_store(&bytes)?;
//! assert_eq!(snapshot, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for stored entries: b"SLVR"
pub const STORE_MAGIC: [u8; 4] = *b"SLVR";

/// Current schema version.
///
/// Increment when `RateSnapshot` changes shape (fields added, removed,
/// reordered or retyped, enum variants changed).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around a stored value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoreEnvelope<T> {
    /// Magic header: must be b"SLVR"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    pub payload: T,
}

impl<T> StoreEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: STORE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value with envelope for the snapshot store.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_store<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = StoreEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        log::error!("Snapshot serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value read from the snapshot store.
///
/// # Errors
///
/// - `Error::DeserializationError`: corrupted Postcard payload
/// - `Error::InvalidCacheEntry`: invalid magic header
/// - `Error::VersionMismatch`: schema version mismatch
pub fn deserialize_from_store<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: StoreEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        log::error!("Snapshot deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != STORE_MAGIC {
        log::warn!(
            "Invalid store entry: expected magic {:?}, got {:?}",
            STORE_MAGIC,
            envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            STORE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        log::warn!(
            "Snapshot version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION,
            envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
