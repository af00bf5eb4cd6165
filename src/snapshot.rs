//! Rate snapshots: immutable, timestamped records of a resolved spot rate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a snapshot's rate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Fetched from the upstream metals API.
    External,
    /// Entered by an administrator.
    Manual,
    /// Hardcoded default used when nothing better is available. Never persisted.
    Fallback,
    /// Loaded by deployment tooling before the first fetch.
    Seed,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateSource::External => write!(f, "external"),
            RateSource::Manual => write!(f, "manual"),
            RateSource::Fallback => write!(f, "fallback"),
            RateSource::Seed => write!(f, "seed"),
        }
    }
}

/// A resolved silver rate, major currency units per gram.
///
/// Snapshots are never mutated. A newer snapshot supersedes an older one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rate_per_gram: Decimal,
    pub source: RateSource,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn new(rate_per_gram: Decimal, source: RateSource, fetched_at: DateTime<Utc>) -> Self {
        RateSnapshot {
            rate_per_gram,
            source,
            fetched_at,
        }
    }

    /// Age of the snapshot at `now`. Clamped to zero for future timestamps.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// True once the snapshot is strictly older than `ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

/// How a [`ResolvedRate`] was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLookup {
    /// Stored snapshot still within TTL.
    CacheHit,
    /// Fetched upstream and persisted during this lookup.
    Refreshed,
    /// Stored snapshot past TTL, returned because fetching was not possible
    /// or not requested.
    Stale,
    /// Hardcoded default, nothing persisted.
    Fallback,
}

impl fmt::Display for RateLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLookup::CacheHit => write!(f, "cache hit"),
            RateLookup::Refreshed => write!(f, "refreshed"),
            RateLookup::Stale => write!(f, "stale"),
            RateLookup::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of a provider lookup. Always carries a positive rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub snapshot: RateSnapshot,
    pub lookup: RateLookup,
}

impl ResolvedRate {
    pub fn rate_per_gram(&self) -> Decimal {
        self.snapshot.rate_per_gram
    }

    pub fn is_fallback(&self) -> bool {
        self.lookup == RateLookup::Fallback
    }
}
