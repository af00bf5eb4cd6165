//! High-level pricing service for web applications.
//!
//! Joins the rate provider and the pricing engine behind one `Arc`-backed
//! handle that is cheap to clone into request handlers.

use crate::client_cache::IndicativeRate;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::fetcher::RateFetcher;
use crate::pricing::{compute_price, PriceBreakdown, PricingInput, ProductPricing};
use crate::provider::RateProvider;
use crate::snapshot::{RateSnapshot, ResolvedRate};
use crate::store::SnapshotStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Price of one item together with the rate it was computed at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub breakdown: PriceBreakdown,
    /// `None` for fixed prices, which never consult the rate.
    pub rate: Option<ResolvedRate>,
}

/// One line of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub input: PricingInput,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(input: PricingInput, quantity: u32) -> Self {
        OrderLine { input, quantity }
    }
}

/// Priced order line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    /// Price of a single unit.
    pub unit: PriceBreakdown,
    pub quantity: u32,
    pub line_total_minor: i64,
}

/// Totals of an order, all lines priced at one rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotal {
    pub lines: Vec<PricedLine>,
    pub total_minor: i64,
    /// `None` when every line had a fixed price.
    pub rate: Option<ResolvedRate>,
}

/// High-level pricing service.
///
/// Wraps a [`RateProvider`] in `Arc` so one instance can be shared across
/// request handlers without an extra lock.
///
/// # Example
///
/// ```no_run
/// use silver_rate_kit::fetcher::StaticRateFetcher;
/// use silver_rate_kit::store::InMemorySnapshotStore;
/// use silver_rate_kit::{OrderLine, PricingInput, PricingService, RateProvider};
/// use rust_decimal::Decimal;
///
/// # async fn example() -> silver_rate_kit::Result<()> {
/// let service = PricingService::new(RateProvider::new(
///     InMemorySnapshotStore::new(),
///     StaticRateFetcher::ok(Decimal::from(95)),
/// ));
///
/// let ring = PricingInput::percent(Decimal::new(55, 1), 30_000, Decimal::from(40))?;
/// let order = service.price_order(&[OrderLine::new(ring, 2)]).await?;
/// println!("total {}", silver_rate_kit::pricing::format_minor(order.total_minor));
/// # Ok(())
/// # }
/// ```
pub struct PricingService<S, F, C = SystemClock> {
    provider: Arc<RateProvider<S, F, C>>,
}

impl<S, F, C> Clone for PricingService<S, F, C> {
    fn clone(&self) -> Self {
        PricingService {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<S: SnapshotStore, F: RateFetcher, C: Clock> PricingService<S, F, C> {
    pub fn new(provider: RateProvider<S, F, C>) -> Self {
        PricingService {
            provider: Arc::new(provider),
        }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &RateProvider<S, F, C> {
        &self.provider
    }

    /// Current server-side rate.
    pub async fn current_rate(&self) -> ResolvedRate {
        self.provider.get_current_rate().await
    }

    /// Price one item at the current rate.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for invalid input or an overflowing price.
    pub async fn quote(&self, input: &PricingInput) -> Result<Quote> {
        input.validate()?;

        if input.is_fixed() {
            return Ok(Quote {
                breakdown: compute_price(input, Decimal::ZERO)?,
                rate: None,
            });
        }

        let rate = self.provider.get_current_rate().await;
        let breakdown = compute_price(input, rate.rate_per_gram())?;
        Ok(Quote {
            breakdown,
            rate: Some(rate),
        })
    }

    /// Price a catalogue product record at the current rate.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the record does not describe exactly
    /// one pricing mode, or for the reasons listed on [`quote`](Self::quote).
    pub async fn quote_product(&self, record: &ProductPricing) -> Result<Quote> {
        let input = PricingInput::try_from(record)?;
        self.quote(&input).await
    }

    /// Price a whole order. Every line is checked before the rate is resolved,
    /// and all dynamic lines share one freshly resolved server-side rate.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationError` when:
    /// - the order has no lines
    /// - a line has quantity zero or invalid input
    /// - a line or the order total overflows
    pub async fn price_order(&self, lines: &[OrderLine]) -> Result<OrderTotal> {
        if lines.is_empty() {
            return Err(Error::ValidationError("order has no lines".to_string()));
        }
        for (index, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(Error::ValidationError(format!(
                    "order line {} has quantity 0",
                    index
                )));
            }
            line.input.validate()?;
        }

        let rate = if lines.iter().all(|line| line.input.is_fixed()) {
            None
        } else {
            Some(self.provider.get_current_rate().await)
        };
        let rate_per_gram = rate
            .as_ref()
            .map(ResolvedRate::rate_per_gram)
            .unwrap_or(Decimal::ZERO);

        let mut priced = Vec::with_capacity(lines.len());
        let mut total_minor: i64 = 0;
        for line in lines {
            let unit = compute_price(&line.input, rate_per_gram)?;
            let line_total_minor = unit
                .final_price_minor
                .checked_mul(i64::from(line.quantity))
                .ok_or_else(|| Error::ValidationError("order line total overflows".to_string()))?;
            total_minor = total_minor
                .checked_add(line_total_minor)
                .ok_or_else(|| Error::ValidationError("order total overflows".to_string()))?;
            priced.push(PricedLine {
                unit,
                quantity: line.quantity,
                line_total_minor,
            });
        }

        info!(
            "✓ Priced order of {} line(s): {} at {}",
            priced.len(),
            total_minor,
            rate.as_ref()
                .map(|r| format!("{}/g ({})", r.rate_per_gram(), r.lookup))
                .unwrap_or_else(|| "fixed prices".to_string())
        );

        Ok(OrderTotal {
            lines: priced,
            total_minor,
            rate,
        })
    }

    /// Display price from a client-side cached rate. Not for checkout.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for invalid input.
    pub fn preview(&self, input: &PricingInput, rate: &IndicativeRate) -> Result<PriceBreakdown> {
        compute_price(input, rate.rate_per_gram())
    }

    /// Administrator rate override.
    ///
    /// # Errors
    /// See [`RateProvider::set_manual_rate`].
    pub async fn set_manual_rate(&self, rate_per_gram: Decimal) -> Result<RateSnapshot> {
        self.provider.set_manual_rate(rate_per_gram).await
    }
}
