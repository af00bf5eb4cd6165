//! Property-based tests for the pricing engine.
//!
//! # Properties Tested
//!
//! 1. **Fixed Override**: final price equals the fixed price for ANY rate
//! 2. **Exact Sums**: subtotal and final are exact sums of their parts
//! 3. **Idempotence**: identical input always yields identical output
//! 4. **Monotonicity**: a higher rate never lowers a dynamic price

use proptest::prelude::*;
use rust_decimal::Decimal;
use silver_rate_kit::pricing::{compute_price, PricingInput};

// ============================================================================
// Strategies
// ============================================================================

/// Weight in milligram steps, up to 5 kg.
fn weight() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000).prop_map(|mg| Decimal::new(mg, 3))
}

/// Rate in paise steps, 0.01 to 10000.00 per gram.
fn rate() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|p| Decimal::new(p, 2))
}

fn making() -> impl Strategy<Value = i64> {
    0i64..10_000_000
}

/// Percent with two decimals, 0 to 300%.
fn percent() -> impl Strategy<Value = Decimal> {
    (0i64..30_000).prop_map(|p| Decimal::new(p, 2))
}

fn dynamic_input() -> impl Strategy<Value = PricingInput> {
    prop_oneof![
        (weight(), making(), percent()).prop_map(|(w, m, p)| PricingInput::Percent {
            silver_weight_grams: w,
            making_charges_minor: m,
            profit_percent: p,
        }),
        (weight(), making(), rate()).prop_map(|(w, m, p)| PricingInput::PerGram {
            silver_weight_grams: w,
            making_charges_minor: m,
            profit_per_gram: p,
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_fixed_price_ignores_rate(price in 0i64..1_000_000_000, rate in any::<i64>()) {
        let input = PricingInput::Fixed { price_minor: price };
        let breakdown = compute_price(&input, Decimal::new(rate, 2)).expect("fixed price");

        prop_assert_eq!(breakdown.final_price_minor, price);
    }

    #[test]
    fn prop_breakdown_sums_exactly(input in dynamic_input(), rate in rate()) {
        let b = compute_price(&input, rate).expect("price");

        prop_assert_eq!(b.subtotal_minor, b.silver_cost_minor + b.making_charges_minor);
        prop_assert_eq!(b.final_price_minor, b.subtotal_minor + b.profit_minor);
        prop_assert!(b.final_price_minor >= 0);
        prop_assert_eq!(b.price_per_gram_used, rate);
    }

    #[test]
    fn prop_idempotent(input in dynamic_input(), rate in rate()) {
        prop_assert_eq!(compute_price(&input, rate).expect("price"), compute_price(&input, rate).expect("price"));
    }

    #[test]
    fn prop_higher_rate_never_cheaper(input in dynamic_input(), low in rate(), bump in 0i64..10_000) {
        let high = low + Decimal::new(bump, 2);
        let at_low = compute_price(&input, low).expect("price");
        let at_high = compute_price(&input, high).expect("price");

        prop_assert!(at_high.final_price_minor >= at_low.final_price_minor);
    }

    #[test]
    fn prop_negative_weight_rejected(mg in 1i64..1_000_000, rate in rate()) {
        let input = PricingInput::Percent {
            silver_weight_grams: Decimal::new(-mg, 3),
            making_charges_minor: 0,
            profit_percent: Decimal::ZERO,
        };

        prop_assert!(compute_price(&input, rate).is_err());
    }
}
