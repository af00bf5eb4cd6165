//! Integration tests for the rate provider.
//!
//! These tests drive the provider through a manual clock, a scripted fetcher
//! and in-memory or deliberately broken stores.

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use silver_rate_kit::observability::RateMetrics;
use silver_rate_kit::store::{InMemorySnapshotStore, SnapshotStore};
use silver_rate_kit::{
    Clock, Error, FetchError, ManualClock, RateLookup, RateProvider, RateProviderConfig,
    RateSnapshot, RateSource, RefreshStrategy, Result, StaticRateFetcher,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Store whose reads and/or writes always fail.
#[derive(Default)]
struct BrokenStore {
    inner: InMemorySnapshotStore,
    fail_reads: bool,
    fail_writes: bool,
}

impl SnapshotStore for BrokenStore {
    async fn latest(&self) -> Result<Option<RateSnapshot>> {
        if self.fail_reads {
            return Err(Error::BackendError("connection refused".to_string()));
        }
        self.inner.latest().await
    }

    async fn append(&self, snapshot: &RateSnapshot) -> Result<()> {
        if self.fail_writes {
            return Err(Error::BackendError("read-only replica".to_string()));
        }
        self.inner.append(snapshot).await
    }
}

#[derive(Clone, Default)]
struct CountingMetrics {
    hits: Arc<AtomicUsize>,
    refreshes: Arc<AtomicUsize>,
    fallbacks: Arc<AtomicUsize>,
    store_errors: Arc<AtomicUsize>,
}

impl RateMetrics for CountingMetrics {
    fn record_cache_hit(&self, _age: Duration) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn record_refresh(&self, _rate: Decimal, _duration: Duration) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn record_fallback(&self, _reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
    }

    fn record_store_error(&self, _error: &str) {
        self.store_errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store holding one external snapshot taken at the clock's current time.
async fn store_with_snapshot(clock: &ManualClock, rate: Decimal) -> InMemorySnapshotStore {
    let store = InMemorySnapshotStore::new();
    store
        .append(&RateSnapshot::new(rate, RateSource::External, clock.now()))
        .await
        .expect("append");
    store
}

// ============================================================================
// TTL policy
// ============================================================================

#[tokio::test]
async fn test_snapshot_older_than_ttl_triggers_fetch() {
    init_logger();
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let fetcher = StaticRateFetcher::ok(dec!(96.80));
    let provider = RateProvider::new(store, fetcher.clone()).with_clock(clock.clone());

    clock.advance(HOUR * 7);
    let resolved = provider.get_current_rate().await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(resolved.lookup, RateLookup::Refreshed);
    assert_eq!(resolved.rate_per_gram(), dec!(96.80));
    assert_eq!(resolved.snapshot.fetched_at, clock.now());
    assert_eq!(provider.store().len(), 2);
}

#[tokio::test]
async fn test_snapshot_within_ttl_returned_unchanged() {
    init_logger();
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let original = store.latest().await.expect("latest");
    let fetcher = StaticRateFetcher::ok(dec!(96.80));
    let provider = RateProvider::new(store, fetcher.clone()).with_clock(clock.clone());

    clock.advance(HOUR);
    let resolved = provider.get_current_rate().await;

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(resolved.lookup, RateLookup::CacheHit);
    assert_eq!(Some(resolved.snapshot), original);
}

#[tokio::test]
async fn test_custom_ttl() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let fetcher = StaticRateFetcher::ok(dec!(91));
    let provider = RateProvider::new(store, fetcher.clone())
        .with_clock(clock.clone())
        .with_config(RateProviderConfig::default().with_cache_ttl(Duration::from_secs(60)))
        .expect("config");

    clock.advance(Duration::from_secs(61));
    assert_eq!(provider.get_current_rate().await.rate_per_gram(), dec!(91));
    assert_eq!(fetcher.calls(), 1);
}

// ============================================================================
// Fallback
// ============================================================================

#[tokio::test]
async fn test_failing_fetcher_returns_default_rate() {
    init_logger();
    let fetcher = StaticRateFetcher::failing(FetchError::Network("dns failure".to_string()));
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher);

    let resolved = provider.get_current_rate().await;

    assert_eq!(resolved.lookup, RateLookup::Fallback);
    assert_eq!(resolved.snapshot.source, RateSource::Fallback);
    assert_eq!(resolved.rate_per_gram(), dec!(95.0));
    assert!(provider.store().is_empty(), "fallback must not be persisted");
}

#[tokio::test]
async fn test_every_fetch_failure_kind_falls_back() {
    let failures = vec![
        FetchError::Timeout,
        FetchError::Status {
            status: 503,
            body: "maintenance".to_string(),
        },
        FetchError::Malformed("not json".to_string()),
        FetchError::MissingTicker("XAG".to_string()),
        FetchError::Upstream("invalid access key".to_string()),
    ];

    for failure in failures {
        let provider = RateProvider::new(
            InMemorySnapshotStore::new(),
            StaticRateFetcher::failing(failure.clone()),
        );
        let resolved = provider.get_current_rate().await;
        assert!(resolved.is_fallback(), "{} should fall back", failure);
        assert!(resolved.rate_per_gram() > Decimal::ZERO);
    }
}

#[tokio::test]
async fn test_stale_snapshot_and_failed_fetch_falls_back_by_default() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let provider = RateProvider::new(store, StaticRateFetcher::failing(FetchError::Timeout))
        .with_clock(clock.clone());

    clock.advance(HOUR * 7);
    let resolved = provider.get_current_rate().await;

    assert_eq!(resolved.lookup, RateLookup::Fallback);
    assert_eq!(resolved.rate_per_gram(), dec!(95));
}

#[tokio::test]
async fn test_serve_stale_on_failure() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let provider = RateProvider::new(store, StaticRateFetcher::failing(FetchError::Timeout))
        .with_clock(clock.clone())
        .with_config(RateProviderConfig::default().with_serve_stale_on_failure(true))
        .expect("config");

    clock.advance(HOUR * 7);
    let resolved = provider.get_current_rate().await;

    assert_eq!(resolved.lookup, RateLookup::Stale);
    assert_eq!(resolved.rate_per_gram(), dec!(90));
}

#[tokio::test]
async fn test_custom_fallback_rate() {
    let provider = RateProvider::new(
        InMemorySnapshotStore::new(),
        StaticRateFetcher::failing(FetchError::Timeout),
    )
    .with_config(RateProviderConfig::default().with_fallback_rate(dec!(88.40)))
    .expect("config");

    assert_eq!(provider.get_current_rate().await.rate_per_gram(), dec!(88.40));
}

#[tokio::test]
async fn test_recovers_after_upstream_comes_back() {
    let fetcher = StaticRateFetcher::failing(FetchError::Timeout);
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher.clone());

    assert!(provider.get_current_rate().await.is_fallback());

    fetcher.set_outcome(Ok(dec!(97)));
    let resolved = provider.get_current_rate().await;
    assert_eq!(resolved.lookup, RateLookup::Refreshed);
    assert_eq!(resolved.rate_per_gram(), dec!(97));
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_unreadable_store_falls_back_without_fetching() {
    init_logger();
    let fetcher = StaticRateFetcher::ok(dec!(96));
    let store = BrokenStore {
        fail_reads: true,
        ..BrokenStore::default()
    };
    let provider = RateProvider::new(store, fetcher.clone());

    let resolved = provider.get_current_rate().await;

    assert!(resolved.is_fallback());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_unwritable_store_falls_back_after_fetch() {
    let fetcher = StaticRateFetcher::ok(dec!(96));
    let metrics = CountingMetrics::default();
    let store = BrokenStore {
        fail_writes: true,
        ..BrokenStore::default()
    };
    let provider =
        RateProvider::new(store, fetcher.clone()).with_metrics(Box::new(metrics.clone()));

    let resolved = provider.get_current_rate().await;

    assert!(resolved.is_fallback());
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(metrics.store_errors.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.fallbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manual_rate_surfaces_store_write_failure() {
    let store = BrokenStore {
        fail_writes: true,
        ..BrokenStore::default()
    };
    let provider = RateProvider::new(store, StaticRateFetcher::ok(dec!(96)));

    assert!(matches!(
        provider.set_manual_rate(dec!(120)).await,
        Err(Error::BackendError(_))
    ));
}

// ============================================================================
// Manual override
// ============================================================================

#[tokio::test]
async fn test_manual_rate_is_next_read() {
    init_logger();
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(95)).await;
    let fetcher = StaticRateFetcher::ok(dec!(96));
    let provider = RateProvider::new(store, fetcher.clone()).with_clock(clock.clone());

    clock.advance(Duration::from_secs(60));
    let manual = provider.set_manual_rate(dec!(120.0)).await.expect("manual rate");
    assert_eq!(manual.source, RateSource::Manual);
    assert_eq!(manual.fetched_at, clock.now());

    let resolved = provider.get_current_rate().await;
    assert_eq!(resolved.rate_per_gram(), dec!(120.0));
    assert_eq!(resolved.snapshot.source, RateSource::Manual);
    assert_eq!(resolved.lookup, RateLookup::CacheHit);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_manual_rate_expires_like_any_snapshot() {
    let clock = ManualClock::default();
    let fetcher = StaticRateFetcher::ok(dec!(96));
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher.clone())
        .with_clock(clock.clone());

    provider.set_manual_rate(dec!(120)).await.expect("manual rate");
    clock.advance(HOUR * 7);

    let resolved = provider.get_current_rate().await;
    assert_eq!(resolved.rate_per_gram(), dec!(96));
    assert_eq!(resolved.snapshot.source, RateSource::External);
}

#[tokio::test]
async fn test_manual_rate_within_same_instant_wins() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(95)).await;
    let provider = RateProvider::new(store, StaticRateFetcher::ok(dec!(96)))
        .with_clock(clock.clone());

    provider.set_manual_rate(dec!(101)).await.expect("manual rate");
    assert_eq!(provider.get_current_rate().await.rate_per_gram(), dec!(101));
}

#[tokio::test]
async fn test_rate_history_newest_first() {
    let clock = ManualClock::default();
    let provider = RateProvider::new(InMemorySnapshotStore::new(), StaticRateFetcher::ok(dec!(96)))
        .with_clock(clock.clone());

    for rate in [dec!(100), dec!(101), dec!(102)] {
        provider.set_manual_rate(rate).await.expect("manual rate");
        clock.advance(Duration::from_secs(60));
    }

    let history = provider.rate_history(2).await.expect("history");
    let rates: Vec<Decimal> = history.iter().map(|s| s.rate_per_gram).collect();
    assert_eq!(rates, vec![dec!(102), dec!(101)]);
}

// ============================================================================
// Strategies
// ============================================================================

#[tokio::test]
async fn test_force_fetches_even_when_fresh() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let fetcher = StaticRateFetcher::ok(dec!(93));
    let provider = RateProvider::new(store, fetcher.clone()).with_clock(clock.clone());

    let resolved = provider.get_rate_with(RefreshStrategy::Force).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(resolved.lookup, RateLookup::Refreshed);
    assert_eq!(resolved.rate_per_gram(), dec!(93));
}

#[tokio::test]
async fn test_failed_force_keeps_fresh_snapshot() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let provider = RateProvider::new(store, StaticRateFetcher::failing(FetchError::Timeout))
        .with_clock(clock.clone());

    let resolved = provider.get_rate_with(RefreshStrategy::Force).await;

    assert_eq!(resolved.lookup, RateLookup::CacheHit);
    assert_eq!(resolved.rate_per_gram(), dec!(90));
}

#[tokio::test]
async fn test_cache_only_never_fetches() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let fetcher = StaticRateFetcher::ok(dec!(93));
    let provider = RateProvider::new(store, fetcher.clone()).with_clock(clock.clone());

    clock.advance(HOUR * 7);
    let stale = provider.get_rate_with(RefreshStrategy::CacheOnly).await;
    assert_eq!(stale.lookup, RateLookup::Stale);
    assert_eq!(stale.rate_per_gram(), dec!(90));

    provider.store().clear();
    let empty = provider.get_rate_with(RefreshStrategy::CacheOnly).await;
    assert!(empty.is_fallback());

    assert_eq!(fetcher.calls(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_single_flight_coalesces_concurrent_refreshes() {
    init_logger();
    let fetcher = StaticRateFetcher::ok(dec!(95.5)).with_delay(Duration::from_millis(50));
    let metrics = CountingMetrics::default();
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher.clone())
        .with_metrics(Box::new(metrics.clone()));

    let results = join_all((0..10).map(|_| provider.get_current_rate())).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(provider.store().len(), 1);
    assert!(results.iter().all(|r| r.rate_per_gram() == dec!(95.5)));
    assert_eq!(
        results
            .iter()
            .filter(|r| r.lookup == RateLookup::Refreshed)
            .count(),
        1
    );
    assert_eq!(metrics.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.hits.load(Ordering::SeqCst), 9);
}

#[tokio::test]
async fn test_single_flight_shares_failed_refresh_during_outage() {
    init_logger();
    let fetcher =
        StaticRateFetcher::failing(FetchError::Timeout).with_delay(Duration::from_millis(200));
    let metrics = CountingMetrics::default();
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher.clone())
        .with_metrics(Box::new(metrics.clone()));

    let started = std::time::Instant::now();
    let results = join_all((0..10).map(|_| provider.get_current_rate())).await;
    let elapsed = started.elapsed();

    assert_eq!(fetcher.calls(), 1);
    assert!(
        elapsed < Duration::from_millis(600),
        "readers queued behind each other: {:?}",
        elapsed
    );
    assert!(results.iter().all(|r| r.is_fallback()));
    assert!(results.iter().all(|r| r.rate_per_gram() == dec!(95)));
    assert_eq!(metrics.fallbacks.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_single_flight_shares_stale_result_during_outage() {
    let clock = ManualClock::default();
    let store = store_with_snapshot(&clock, dec!(90)).await;
    let fetcher =
        StaticRateFetcher::failing(FetchError::Timeout).with_delay(Duration::from_millis(50));
    let provider = RateProvider::new(store, fetcher.clone())
        .with_clock(clock.clone())
        .with_config(RateProviderConfig::default().with_serve_stale_on_failure(true))
        .expect("config");

    clock.advance(HOUR * 7);
    let results = join_all((0..5).map(|_| provider.get_current_rate())).await;

    assert_eq!(fetcher.calls(), 1);
    assert!(results
        .iter()
        .all(|r| r.lookup == RateLookup::Stale && r.rate_per_gram() == dec!(90)));
}

#[tokio::test]
async fn test_failed_refresh_not_reused_by_later_reads() {
    let fetcher = StaticRateFetcher::failing(FetchError::Timeout);
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher.clone());

    assert!(provider.get_current_rate().await.is_fallback());
    assert!(provider.get_current_rate().await.is_fallback());
    assert_eq!(fetcher.calls(), 2);

    fetcher.set_outcome(Ok(dec!(97)));
    assert_eq!(provider.get_current_rate().await.lookup, RateLookup::Refreshed);
}

#[tokio::test]
async fn test_without_single_flight_each_stale_read_fetches() {
    let fetcher = StaticRateFetcher::ok(dec!(95.5)).with_delay(Duration::from_millis(20));
    let provider = RateProvider::new(InMemorySnapshotStore::new(), fetcher.clone())
        .with_config(RateProviderConfig::default().with_single_flight(false))
        .expect("config");

    let results = join_all((0..4).map(|_| provider.get_current_rate())).await;

    assert_eq!(fetcher.calls(), 4);
    assert!(results.iter().all(|r| r.lookup == RateLookup::Refreshed));
}

#[tokio::test]
async fn test_health_check_delegates_to_store() {
    let provider = RateProvider::new(InMemorySnapshotStore::new(), StaticRateFetcher::ok(dec!(95)));
    assert!(provider.health_check().await.expect("health check"));
}
