//! Caller-local cache of the last resolved rate.
//!
//! A [`ClientRateCache`] sits in front of a [`RateProvider`] on the consumer
//! side (a storefront process, a UI session) and hands out
//! [`IndicativeRate`]s. Those are good enough for listing prices but are not
//! authoritative: [`PricingService::price_order`](crate::PricingService::price_order)
//! never accepts one and always resolves a fresh server-side rate.

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_CACHE_TTL;
use crate::fetcher::RateFetcher;
use crate::provider::RateProvider;
use crate::snapshot::{RateLookup, RateSource, ResolvedRate};
use crate::store::SnapshotStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::RwLock;

/// A display-only silver rate.
///
/// Only a [`ClientRateCache`] can produce one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicativeRate {
    rate_per_gram: Decimal,
    source: RateSource,
    fetched_at: DateTime<Utc>,
    cached_at: DateTime<Utc>,
    /// `None` when the deadline is beyond what `DateTime` can represent.
    expires_at: Option<DateTime<Utc>>,
}

impl IndicativeRate {
    /// Expires at whichever comes first: the client TTL from `cached_at`, or
    /// the server TTL from the snapshot's `fetched_at`.
    fn from_resolved(
        resolved: &ResolvedRate,
        cached_at: DateTime<Utc>,
        client_ttl: Duration,
        server_ttl: Duration,
    ) -> Self {
        let fetched_at = resolved.snapshot.fetched_at;
        let expires_at = match (
            deadline(cached_at, client_ttl),
            deadline(fetched_at, server_ttl),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        IndicativeRate {
            rate_per_gram: resolved.rate_per_gram(),
            source: resolved.snapshot.source,
            fetched_at,
            cached_at,
            expires_at,
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now <= expires_at)
    }

    pub fn rate_per_gram(&self) -> Decimal {
        self.rate_per_gram
    }

    pub fn source(&self) -> RateSource {
        self.source
    }

    /// When the underlying snapshot was taken.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }
}

fn deadline(start: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| start.checked_add_signed(ttl))
}

/// Local cache of one [`IndicativeRate`] with its own TTL.
///
/// An entry never outlives the server's staleness window: it expires when
/// either the client TTL or the provider's `cache_ttl` (counted from the
/// snapshot's `fetched_at`) runs out. Fallback and stale results are handed
/// out but never cached, so the next call asks the provider again.
pub struct ClientRateCache<C = SystemClock> {
    ttl: Duration,
    clock: C,
    slot: RwLock<Option<IndicativeRate>>,
}

impl ClientRateCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl Default for ClientRateCache<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl<C: Clock> ClientRateCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        ClientRateCache {
            ttl,
            clock,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached rate if still live.
    pub async fn peek(&self) -> Option<IndicativeRate> {
        let now = self.clock.now();
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|rate| rate.is_live(now))
            .cloned()
    }

    /// Cached rate, or a fresh one from `provider`.
    pub async fn get_or_resolve<S, F, PC>(
        &self,
        provider: &RateProvider<S, F, PC>,
    ) -> IndicativeRate
    where
        S: SnapshotStore,
        F: RateFetcher,
        PC: Clock,
    {
        if let Some(rate) = self.peek().await {
            debug!("✓ Client rate cache hit: {}", rate.rate_per_gram);
            return rate;
        }

        let resolved = provider.get_current_rate().await;
        let rate = IndicativeRate::from_resolved(
            &resolved,
            self.clock.now(),
            self.ttl,
            provider.config().cache_ttl,
        );

        if matches!(resolved.lookup, RateLookup::Fallback | RateLookup::Stale) {
            debug!(
                "Client rate cache skipped {} rate {}",
                resolved.lookup, rate.rate_per_gram
            );
        } else {
            *self.slot.write().await = Some(rate.clone());
            debug!("Client rate cache filled: {}", rate.rate_per_gram);
        }
        rate
    }

    /// Drop the cached value.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}
