//! Upstream rate sources.
//!
//! The [`RateFetcher`] trait decouples the provider from the HTTP API so the
//! staleness and fallback logic can be exercised with [`StaticRateFetcher`].
//!
//! # Upstream format
//!
//! The metals API quotes the *inverse* of a price: how many troy ounces of
//! the metal one unit of local currency buys.
//!
//! ```text
//! GET {endpoint}?access_key=KEY&base=INR&symbols=XAG
//!
//! { "success": true, "base": "INR", "rates": { "XAG": 0.000338 } }
//! ```
//!
//! `1 / 0.000338` is rupees per troy ounce; dividing by 31.1035 g/oz and
//! rounding to two decimals gives rupees per gram (`95.12`).

use crate::config::MetalsApiConfig;
use crate::error::{Error, FetchError, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Grams per troy ounce.
pub const TROY_OUNCE_GRAMS: Decimal = Decimal::from_parts(311_035, 0, 0, false, 4);

/// Source of fresh silver rates, major currency units per gram.
///
/// Implementations report failures as [`FetchError`]; they never fall back
/// on their own. That is the provider's job.
#[allow(async_fn_in_trait)]
pub trait RateFetcher: Send + Sync {
    /// Fetch the current rate per gram.
    ///
    /// # Errors
    /// Returns the precise reason the upstream value is unavailable.
    async fn fetch_rate(&self) -> std::result::Result<Decimal, FetchError>;

    /// Label used in logs.
    fn name(&self) -> &str {
        "upstream"
    }
}

/// Convert an inverse per-ounce quote into a per-gram price, 2 dp half-up.
///
/// # Errors
/// `FetchError::Malformed` if the quote is not positive.
pub fn per_gram_from_inverse_quote(
    units_per_currency: Decimal,
) -> std::result::Result<Decimal, FetchError> {
    if units_per_currency <= Decimal::ZERO {
        return Err(FetchError::Malformed(format!(
            "quote must be positive, got {}",
            units_per_currency
        )));
    }

    Decimal::ONE
        .checked_div(units_per_currency)
        .and_then(|per_ounce| per_ounce.checked_div(TROY_OUNCE_GRAMS))
        .map(|per_gram| per_gram.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .filter(|per_gram| *per_gram > Decimal::ZERO)
        .ok_or_else(|| {
            FetchError::Malformed(format!("quote {} out of range", units_per_currency))
        })
}

// ============================================================================
// Metals API
// ============================================================================

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// HTTP client for the metals pricing API.
pub struct MetalsApiFetcher {
    client: reqwest::Client,
    config: MetalsApiConfig,
}

impl MetalsApiFetcher {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: MetalsApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            warn!("Metals API configured without an access key");
        }

        Ok(MetalsApiFetcher { client, config })
    }

    /// Reuse an existing [`reqwest::Client`]. Its own timeout applies.
    pub fn with_client(client: reqwest::Client, config: MetalsApiConfig) -> Self {
        MetalsApiFetcher { client, config }
    }

    pub fn config(&self) -> &MetalsApiConfig {
        &self.config
    }

    fn parse(&self, body: LatestRatesResponse) -> std::result::Result<Decimal, FetchError> {
        if body.success == Some(false) {
            let detail = body
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "success=false".to_string());
            return Err(FetchError::Upstream(detail));
        }

        let quote = body
            .rates
            .get(&self.config.ticker)
            .copied()
            .ok_or_else(|| FetchError::MissingTicker(self.config.ticker.clone()))?;

        let quote = Decimal::from_f64(quote)
            .ok_or_else(|| FetchError::Malformed(format!("unusable quote {}", quote)))?;

        per_gram_from_inverse_quote(quote)
    }
}

impl RateFetcher for MetalsApiFetcher {
    async fn fetch_rate(&self) -> std::result::Result<Decimal, FetchError> {
        let mut request = self.client.get(&self.config.endpoint).query(&[
            ("base", self.config.base_currency.as_str()),
            ("symbols", self.config.ticker.as_str()),
        ]);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("access_key", key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        let rate = self.parse(body)?;
        debug!(
            "✓ Metals API {} {} -> {}/g",
            self.config.base_currency, self.config.ticker, rate
        );
        Ok(rate)
    }

    fn name(&self) -> &str {
        "metals-api"
    }
}

// ============================================================================
// Static fetcher
// ============================================================================

/// Fetcher returning a preset outcome, for tests and local development.
///
/// Clones share the outcome and the call counter.
///
/// ```
/// use silver_rate_kit::fetcher::{RateFetcher, StaticRateFetcher};
/// use rust_decimal::Decimal;
///
/// # #[tokio::main] async fn main() {
/// let fetcher = StaticRateFetcher::ok(Decimal::from(97));
/// assert_eq!(fetcher.fetch_rate().await, Ok(Decimal::from(97)));
/// assert_eq!(fetcher.calls(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct StaticRateFetcher {
    outcome: Arc<Mutex<std::result::Result<Decimal, FetchError>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl StaticRateFetcher {
    /// Always succeed with `rate`.
    pub fn ok(rate: Decimal) -> Self {
        Self::with_outcome(Ok(rate))
    }

    /// Always fail with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: std::result::Result<Decimal, FetchError>) -> Self {
        StaticRateFetcher {
            outcome: Arc::new(Mutex::new(outcome)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Sleep before answering, to simulate a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change what subsequent calls return.
    pub fn set_outcome(&self, outcome: std::result::Result<Decimal, FetchError>) {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RateFetcher for StaticRateFetcher {
    async fn fetch_rate(&self) -> std::result::Result<Decimal, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}
