//! Rate provider - resolves the current silver rate.

use crate::clock::{Clock, SystemClock};
use crate::config::RateProviderConfig;
use crate::error::{Error, FetchError, Result};
use crate::fetcher::RateFetcher;
use crate::observability::{NoOpMetrics, RateMetrics};
use crate::snapshot::{RateLookup, RateSnapshot, RateSource, ResolvedRate};
use crate::store::SnapshotStore;
use crate::strategy::RefreshStrategy;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;

/// Resolves the current silver rate from a snapshot store, refreshing from an
/// upstream fetcher when the stored snapshot is stale.
///
/// Reads never fail. Every acquisition problem (upstream down, malformed
/// payload, store unreachable) ends in a fallback snapshot at
/// [`RateProviderConfig::fallback_rate`], which is never persisted.
///
/// # Example
///
/// ```no_run
/// use silver_rate_kit::fetcher::StaticRateFetcher;
/// use silver_rate_kit::store::InMemorySnapshotStore;
/// use silver_rate_kit::RateProvider;
/// use rust_decimal::Decimal;
///
/// # async fn example() {
/// let provider = RateProvider::new(
///     InMemorySnapshotStore::new(),
///     StaticRateFetcher::ok(Decimal::new(9612, 2)),
/// );
///
/// let rate = provider.get_current_rate().await;
/// println!("{} per gram ({})", rate.rate_per_gram(), rate.lookup);
/// # }
/// ```
pub struct RateProvider<S, F, C = SystemClock> {
    store: S,
    fetcher: F,
    clock: C,
    config: RateProviderConfig,
    metrics: Box<dyn RateMetrics>,
    /// Outcome of the last refresh, handed to callers that queued behind it.
    refresh_guard: Mutex<Option<ResolvedRate>>,
    /// Completed refresh attempts.
    refresh_generation: AtomicU64,
}

impl<S: SnapshotStore, F: RateFetcher> RateProvider<S, F, SystemClock> {
    /// Create a provider on the wall clock with the default policy.
    pub fn new(store: S, fetcher: F) -> Self {
        RateProvider {
            store,
            fetcher,
            clock: SystemClock,
            config: RateProviderConfig::default(),
            metrics: Box::new(NoOpMetrics),
            refresh_guard: Mutex::new(None),
            refresh_generation: AtomicU64::new(0),
        }
    }
}

impl<S: SnapshotStore, F: RateFetcher, C: Clock> RateProvider<S, F, C> {
    /// Replace the time source.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> RateProvider<S, F, C2> {
        RateProvider {
            store: self.store,
            fetcher: self.fetcher,
            clock,
            config: self.config,
            metrics: self.metrics,
            refresh_guard: self.refresh_guard,
            refresh_generation: self.refresh_generation,
        }
    }

    /// Replace the caching policy.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the fallback rate is not positive.
    pub fn with_config(mut self, config: RateProviderConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn RateMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RateProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Current rate under the default [`RefreshStrategy::Refresh`].
    pub async fn get_current_rate(&self) -> ResolvedRate {
        self.get_rate_with(RefreshStrategy::Refresh).await
    }

    /// Resolve the rate with an explicit strategy.
    pub async fn get_rate_with(&self, strategy: RefreshStrategy) -> ResolvedRate {
        let timer = Instant::now();

        let latest = match self.store.latest().await {
            Ok(latest) => latest,
            Err(e) => {
                self.metrics.record_store_error(&e.to_string());
                error!("Snapshot store read failed: {}", e);
                return self.fallback(&format!("store read failed: {}", e));
            }
        };

        debug!(
            "» Rate lookup (strategy: {}, stored: {})",
            strategy,
            latest
                .as_ref()
                .map(|s| format!("{} @ {}", s.rate_per_gram, s.fetched_at))
                .unwrap_or_else(|| "none".to_string())
        );

        let resolved = match strategy {
            RefreshStrategy::Refresh => match latest {
                Some(snapshot) if self.is_fresh(&snapshot) => self.cache_hit(snapshot),
                previous => self.refresh(previous, false).await,
            },
            RefreshStrategy::Force => self.refresh(latest, true).await,
            RefreshStrategy::CacheOnly => match latest {
                Some(snapshot) if self.is_fresh(&snapshot) => self.cache_hit(snapshot),
                Some(snapshot) => self.stale(snapshot, "fetching disabled by strategy"),
                None => self.fallback("store empty and fetching disabled by strategy"),
            },
        };

        debug!(
            "✓ Rate resolved to {} ({}) in {:?}",
            resolved.rate_per_gram(),
            resolved.lookup,
            timer.elapsed()
        );
        resolved
    }

    /// Persist an administrator-entered rate. It becomes the current rate at
    /// once, whatever the age of the stored snapshot.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: rate is zero or negative (nothing persisted)
    /// - `Error::BackendError` and envelope errors: the store write failed
    pub async fn set_manual_rate(&self, rate_per_gram: Decimal) -> Result<RateSnapshot> {
        if rate_per_gram <= Decimal::ZERO {
            return Err(Error::ValidationError(format!(
                "manual rate must be positive, got {}",
                rate_per_gram
            )));
        }

        let snapshot = RateSnapshot::new(rate_per_gram, RateSource::Manual, self.clock.now());
        if let Err(e) = self.store.append(&snapshot).await {
            self.metrics.record_store_error(&e.to_string());
            error!("Failed to persist manual rate {}: {}", rate_per_gram, e);
            return Err(e);
        }

        self.metrics.record_manual_override(rate_per_gram);
        info!("✓ Manual silver rate set to {}/g", rate_per_gram);
        Ok(snapshot)
    }

    /// Store a seed snapshot if the store holds nothing yet.
    ///
    /// Returns the seed when written, `None` when a snapshot already existed.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for a non-positive rate, or the store error.
    pub async fn seed_if_empty(&self, rate_per_gram: Decimal) -> Result<Option<RateSnapshot>> {
        if rate_per_gram <= Decimal::ZERO {
            return Err(Error::ValidationError(format!(
                "seed rate must be positive, got {}",
                rate_per_gram
            )));
        }
        if self.store.latest().await?.is_some() {
            return Ok(None);
        }

        let snapshot = RateSnapshot::new(rate_per_gram, RateSource::Seed, self.clock.now());
        self.store.append(&snapshot).await?;
        info!("✓ Seeded silver rate {}/g", rate_per_gram);
        Ok(Some(snapshot))
    }

    /// Persisted snapshots, newest first.
    ///
    /// # Errors
    /// Returns the store error.
    pub async fn rate_history(&self, limit: usize) -> Result<Vec<RateSnapshot>> {
        self.store.history(limit).await
    }

    /// # Errors
    /// Returns `Err` if the store is not accessible.
    pub async fn health_check(&self) -> Result<bool> {
        self.store.health_check().await
    }

    fn is_fresh(&self, snapshot: &RateSnapshot) -> bool {
        !snapshot.is_stale(self.clock.now(), self.config.cache_ttl)
    }

    async fn refresh(&self, previous: Option<RateSnapshot>, force: bool) -> ResolvedRate {
        if !self.config.single_flight {
            return self.fetch_and_store(previous).await;
        }

        let seen = self.refresh_generation.load(Ordering::SeqCst);
        let mut last = self.refresh_guard.lock().await;

        if !force {
            match self.store.latest().await {
                Ok(Some(snapshot)) if self.is_fresh(&snapshot) => {
                    debug!("Refresh already done by a concurrent lookup");
                    return self.cache_hit(snapshot);
                }
                Ok(_) => {}
                Err(e) => {
                    self.metrics.record_store_error(&e.to_string());
                    return self.fallback(&format!("store read failed: {}", e));
                }
            }
        }

        // A refresh failed while we queued: share its outcome instead of
        // calling upstream again.
        if !force && self.refresh_generation.load(Ordering::SeqCst) != seen {
            if let Some(shared) = last.as_ref() {
                debug!(
                    "Sharing concurrent refresh outcome {} ({})",
                    shared.rate_per_gram(),
                    shared.lookup
                );
                if matches!(shared.lookup, RateLookup::Fallback | RateLookup::Stale) {
                    self.metrics.record_fallback("concurrent refresh failed");
                }
                return shared.clone();
            }
        }

        let resolved = self.fetch_and_store(previous).await;
        *last = Some(resolved.clone());
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        resolved
    }

    async fn fetch_and_store(&self, previous: Option<RateSnapshot>) -> ResolvedRate {
        let started = Instant::now();
        let rate = match self.fetch().await {
            Ok(rate) => rate,
            Err(e) => {
                warn!("✗ {} rate fetch failed: {}", self.fetcher.name(), e);
                return self.degrade(previous, &format!("fetch failed: {}", e));
            }
        };

        let snapshot = RateSnapshot::new(rate, RateSource::External, self.clock.now());
        if let Err(e) = self.store.append(&snapshot).await {
            self.metrics.record_store_error(&e.to_string());
            error!("Failed to persist fetched rate {}: {}", rate, e);
            return self.degrade(previous, &format!("store write failed: {}", e));
        }

        self.metrics.record_refresh(rate, started.elapsed());
        info!(
            "✓ Silver rate refreshed from {}: {}/g",
            self.fetcher.name(),
            rate
        );
        ResolvedRate {
            snapshot,
            lookup: RateLookup::Refreshed,
        }
    }

    async fn fetch(&self) -> std::result::Result<Decimal, FetchError> {
        let rate = self.fetcher.fetch_rate().await?;
        if rate <= Decimal::ZERO {
            return Err(FetchError::Malformed(format!(
                "non-positive rate {}",
                rate
            )));
        }
        Ok(rate)
    }

    /// Best answer after a failed refresh.
    fn degrade(&self, previous: Option<RateSnapshot>, reason: &str) -> ResolvedRate {
        match previous {
            Some(snapshot) if self.is_fresh(&snapshot) => self.cache_hit(snapshot),
            Some(snapshot) if self.config.serve_stale_on_failure => self.stale(snapshot, reason),
            _ => self.fallback(reason),
        }
    }

    fn cache_hit(&self, snapshot: RateSnapshot) -> ResolvedRate {
        self.metrics
            .record_cache_hit(snapshot.age(self.clock.now()));
        debug!("✓ Rate cache hit ({})", snapshot.source);
        ResolvedRate {
            snapshot,
            lookup: RateLookup::CacheHit,
        }
    }

    fn stale(&self, snapshot: RateSnapshot, reason: &str) -> ResolvedRate {
        self.metrics.record_fallback(reason);
        warn!(
            "Serving stale rate {} from {} ({})",
            snapshot.rate_per_gram, snapshot.fetched_at, reason
        );
        ResolvedRate {
            snapshot,
            lookup: RateLookup::Stale,
        }
    }

    fn fallback(&self, reason: &str) -> ResolvedRate {
        self.metrics.record_fallback(reason);
        warn!(
            "Serving fallback rate {}/g ({})",
            self.config.fallback_rate, reason
        );
        ResolvedRate {
            snapshot: RateSnapshot::new(
                self.config.fallback_rate,
                RateSource::Fallback,
                self.clock.now(),
            ),
            lookup: RateLookup::Fallback,
        }
    }
}
