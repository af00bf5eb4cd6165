//! Pricing engine: product attributes plus a silver spot rate in, sale price
//! breakdown out.
//!
//! Everything in this module is pure. Weights, rates and markups are exact
//! [`Decimal`]s; every amount of money is an `i64` in the currency's minor
//! unit (paise). The only rounding happens when a decimal quantity is turned
//! into minor units, and it is always half-up.
//!
//! # Modes
//!
//! | Mode | Profit | Use |
//! |------|--------|-----|
//! | `Percent` | `round(subtotal * percent / 100)` | older product flow |
//! | `PerGram` | `round(profit_per_gram * weight * 100)` | newer product flow |
//! | `Fixed` | n/a, price replaces the calculation | antiques, bespoke pieces |
//!
//! # Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use silver_rate_kit::pricing::{compute_price, PricingInput};
//!
//! # fn main() -> silver_rate_kit::Result<()> {
//! let input = PricingInput::percent(Decimal::new(555, 1), 150_000, Decimal::from(45))?;
//! let price = compute_price(&input, Decimal::from(95))?;
//!
//! assert_eq!(price.silver_cost_minor, 527_250);
//! assert_eq!(price.final_price_minor, 982_013);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Minor units per major unit (paise per rupee).
const MINOR_PER_MAJOR: Decimal = Decimal::ONE_HUNDRED;

/// Per-product pricing parameters, one mode per calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PricingInput {
    /// Markup as a percentage of silver cost plus making charges.
    Percent {
        silver_weight_grams: Decimal,
        making_charges_minor: i64,
        profit_percent: Decimal,
    },

    /// Flat markup per gram of silver.
    PerGram {
        silver_weight_grams: Decimal,
        making_charges_minor: i64,
        profit_per_gram: Decimal,
    },

    /// Operator-set price replacing the dynamic calculation.
    Fixed { price_minor: i64 },
}

impl PricingInput {
    /// Percent-of-subtotal markup.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if any argument is negative.
    pub fn percent(
        silver_weight_grams: Decimal,
        making_charges_minor: i64,
        profit_percent: Decimal,
    ) -> Result<Self> {
        let input = PricingInput::Percent {
            silver_weight_grams,
            making_charges_minor,
            profit_percent,
        };
        input.validate()?;
        Ok(input)
    }

    /// Flat per-gram markup, `profit_per_gram` in major units.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if any argument is negative.
    pub fn per_gram(
        silver_weight_grams: Decimal,
        making_charges_minor: i64,
        profit_per_gram: Decimal,
    ) -> Result<Self> {
        let input = PricingInput::PerGram {
            silver_weight_grams,
            making_charges_minor,
            profit_per_gram,
        };
        input.validate()?;
        Ok(input)
    }

    /// Fixed-price override.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the price is negative.
    pub fn fixed(price_minor: i64) -> Result<Self> {
        let input = PricingInput::Fixed { price_minor };
        input.validate()?;
        Ok(input)
    }

    /// Check every field is within range.
    ///
    /// A weight of zero is accepted and prices the item at making charges
    /// plus markup.
    pub fn validate(&self) -> Result<()> {
        match *self {
            PricingInput::Percent {
                silver_weight_grams,
                making_charges_minor,
                profit_percent,
            } => {
                ensure_weight(silver_weight_grams)?;
                ensure_non_negative_minor("making charges", making_charges_minor)?;
                ensure_non_negative("profit percent", profit_percent)
            }
            PricingInput::PerGram {
                silver_weight_grams,
                making_charges_minor,
                profit_per_gram,
            } => {
                ensure_weight(silver_weight_grams)?;
                ensure_non_negative_minor("making charges", making_charges_minor)?;
                ensure_non_negative("profit per gram", profit_per_gram)
            }
            PricingInput::Fixed { price_minor } => {
                ensure_non_negative_minor("fixed price", price_minor)
            }
        }
    }

    /// True for the fixed-price override.
    pub fn is_fixed(&self) -> bool {
        matches!(self, PricingInput::Fixed { .. })
    }
}

/// Derived price of one item. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub silver_cost_minor: i64,
    pub making_charges_minor: i64,
    pub subtotal_minor: i64,
    pub profit_minor: i64,
    pub final_price_minor: i64,
    /// Spot rate used, major units per gram. Zero for fixed prices.
    pub price_per_gram_used: Decimal,
}

impl PriceBreakdown {
    fn fixed(price_minor: i64) -> Self {
        PriceBreakdown {
            silver_cost_minor: 0,
            making_charges_minor: 0,
            subtotal_minor: 0,
            profit_minor: 0,
            final_price_minor: price_minor,
            price_per_gram_used: Decimal::ZERO,
        }
    }

    /// Final price in major units, e.g. `9820.13`.
    pub fn final_price_major(&self) -> Decimal {
        Decimal::new(self.final_price_minor, 2)
    }
}

/// Compute the sale price of one item at the given spot rate.
///
/// `rate_per_gram` is in major units (rupees per gram). The fixed-price mode
/// ignores it entirely.
///
/// # Errors
///
/// Returns `Error::ValidationError` when:
/// - the input fails [`PricingInput::validate`]
/// - a dynamic mode is given a rate that is zero or negative
/// - an amount no longer fits in `i64` minor units
pub fn compute_price(input: &PricingInput, rate_per_gram: Decimal) -> Result<PriceBreakdown> {
    input.validate()?;

    let (weight, making_charges_minor) = match *input {
        PricingInput::Fixed { price_minor } => return Ok(PriceBreakdown::fixed(price_minor)),
        PricingInput::Percent {
            silver_weight_grams,
            making_charges_minor,
            ..
        }
        | PricingInput::PerGram {
            silver_weight_grams,
            making_charges_minor,
            ..
        } => (silver_weight_grams, making_charges_minor),
    };

    if rate_per_gram <= Decimal::ZERO {
        return Err(Error::ValidationError(format!(
            "rate per gram must be positive, got {}",
            rate_per_gram
        )));
    }

    let silver_cost_minor = round_half_up(
        weight
            .checked_mul(rate_per_gram)
            .and_then(|v| v.checked_mul(MINOR_PER_MAJOR)),
    )?;
    let subtotal_minor = add_minor(silver_cost_minor, making_charges_minor)?;

    let profit_minor = match *input {
        PricingInput::Percent { profit_percent, .. } => round_half_up(
            Decimal::from(subtotal_minor)
                .checked_mul(profit_percent)
                .and_then(|v| v.checked_div(MINOR_PER_MAJOR)),
        )?,
        PricingInput::PerGram {
            profit_per_gram, ..
        } => round_half_up(
            profit_per_gram
                .checked_mul(weight)
                .and_then(|v| v.checked_mul(MINOR_PER_MAJOR)),
        )?,
        PricingInput::Fixed { .. } => 0,
    };

    Ok(PriceBreakdown {
        silver_cost_minor,
        making_charges_minor,
        subtotal_minor,
        profit_minor,
        final_price_minor: add_minor(subtotal_minor, profit_minor)?,
        price_per_gram_used: rate_per_gram,
    })
}

/// Render a minor-unit amount in major units with two decimals.
///
/// ```
/// assert_eq!(silver_rate_kit::pricing::format_minor(982_013), "9820.13");
/// ```
pub fn format_minor(amount_minor: i64) -> String {
    Decimal::new(amount_minor, 2).to_string()
}

fn round_half_up(value: Option<Decimal>) -> Result<i64> {
    value
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_i64())
        .ok_or_else(overflow)
}

fn add_minor(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b).ok_or_else(overflow)
}

fn overflow() -> Error {
    Error::ValidationError("price exceeds representable range".to_string())
}

fn ensure_weight(weight: Decimal) -> Result<()> {
    ensure_non_negative("silver weight", weight)
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(Error::ValidationError(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(())
}

fn ensure_non_negative_minor(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::ValidationError(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(())
}

// ============================================================================
// Catalogue records
// ============================================================================

/// Pricing columns of a catalogue product as stored, every field optional.
///
/// Convert with `PricingInput::try_from(&record)`:
/// - a fixed price wins over everything else
/// - otherwise a weight and exactly one markup convention are required
/// - missing making charges count as zero
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPricing {
    pub silver_weight_grams: Option<Decimal>,
    pub making_charges_minor: Option<i64>,
    pub profit_percent: Option<Decimal>,
    pub profit_per_gram: Option<Decimal>,
    pub fixed_price_minor: Option<i64>,
}

impl TryFrom<&ProductPricing> for PricingInput {
    type Error = Error;

    fn try_from(record: &ProductPricing) -> Result<Self> {
        if let Some(price_minor) = record.fixed_price_minor {
            return PricingInput::fixed(price_minor);
        }

        let weight = record.silver_weight_grams.ok_or_else(|| {
            Error::ValidationError(
                "product has neither a fixed price nor a silver weight".to_string(),
            )
        })?;
        let making = record.making_charges_minor.unwrap_or(0);

        match (record.profit_percent, record.profit_per_gram) {
            (Some(percent), None) => PricingInput::percent(weight, making, percent),
            (None, Some(per_gram)) => PricingInput::per_gram(weight, making, per_gram),
            (Some(_), Some(_)) => Err(Error::ValidationError(
                "product sets both profit percent and profit per gram".to_string(),
            )),
            (None, None) => Err(Error::ValidationError(
                "product has no profit markup".to_string(),
            )),
        }
    }
}
