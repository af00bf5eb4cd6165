//! Metrics hooks for rate acquisition.
//!
//! Implement [`RateMetrics`] to forward provider events to a monitoring
//! system:
//!
//! ```ignore
//! use silver_rate_kit::observability::RateMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl RateMetrics for PrometheusMetrics {
//!     fn record_fallback(&self, reason: &str) {
//!         // counter!("silver_rate_fallbacks").inc();
//!     }
//!     // ... override the others as needed
//! }
//!
//! // let provider = RateProvider::new(store, fetcher)
//! //     .with_metrics(Box::new(PrometheusMetrics));
//! ```
//!
//! Providers start with [`NoOpMetrics`]. The trait's default method bodies
//! log through the `log` crate, so an empty `impl RateMetrics for X {}`
//! gives log-only metrics.

use rust_decimal::Decimal;
use std::time::Duration;

/// Trait for rate provider metrics collection.
pub trait RateMetrics: Send + Sync {
    /// Stored snapshot served within TTL.
    fn record_cache_hit(&self, age: Duration) {
        debug!("Rate cache HIT, age {:?}", age);
    }

    /// Upstream fetch succeeded.
    fn record_refresh(&self, rate: Decimal, duration: Duration) {
        debug!("Rate REFRESH {} took {:?}", rate, duration);
    }

    /// Fallback or stale value served instead of a fresh one.
    fn record_fallback(&self, reason: &str) {
        warn!("Rate FALLBACK: {}", reason);
    }

    /// Administrator set the rate by hand.
    fn record_manual_override(&self, rate: Decimal) {
        info!("Rate MANUAL override {}", rate);
    }

    /// Snapshot store read or write failed.
    fn record_store_error(&self, error: &str) {
        warn!("Rate store ERROR: {}", error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl RateMetrics for NoOpMetrics {
    fn record_cache_hit(&self, _age: Duration) {}
    fn record_refresh(&self, _rate: Decimal, _duration: Duration) {}
    fn record_fallback(&self, _reason: &str) {}
    fn record_manual_override(&self, _rate: Decimal) {}
    fn record_store_error(&self, _error: &str) {}
}

/// Log-only metrics using the trait defaults.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl RateMetrics for LogMetrics {}
