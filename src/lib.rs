//! # silver-rate-kit
//!
//! Dynamic silver-price calculation for jewellery storefronts, backed by a
//! time-bounded cache of the silver spot rate.
//!
//! ## Features
//!
//! - **Exact Money:** Decimal weights and rates, `i64` minor-unit prices, half-up rounding
//! - **Three Pricing Modes:** Percent markup, per-gram markup, fixed-price override
//! - **Always Answers:** Rate lookups never fail; upstream trouble ends in a fallback rate
//! - **Pluggable:** Snapshot store, upstream fetcher and clock are all injected
//! - **Production Ready:** Built-in logging, metrics hooks and env/TOML configuration
//!
//! ## Quick Start
//!
//! Use [`PricingService`] for easy sharing across request handlers:
//!
//! ```ignore
//! use silver_rate_kit::{
//!     config::RateSettings,
//!     fetcher::MetalsApiFetcher,
//!     store::InMemorySnapshotStore,
//!     PricingInput, PricingService, RateProvider,
//! };
//! use rust_decimal::Decimal;
//!
//! // 1. Load settings from SILVER_RATE_* variables
//! let settings = RateSettings::from_env()?;
//!
//! // 2. Build the provider
//! let provider = RateProvider::new(
//!     InMemorySnapshotStore::new(),
//!     MetalsApiFetcher::new(settings.metals_api_config())?,
//! )
//! .with_config(settings.provider_config())?;
//!
//! // 3. Wrap it - PricingService is Clone for handler sharing
//! let pricing = PricingService::new(provider);
//!
//! // 4. Price a product
//! let input = PricingInput::percent(Decimal::new(255, 1), 80_000, Decimal::from(45))?;
//! let quote = pricing.quote(&input).await?;
//! println!("{}", silver_rate_kit::pricing::format_minor(quote.breakdown.final_price_minor));
//! ```
//!
//! ### Rate Only
//!
//! Use [`RateProvider`] directly when you just need the rate:
//!
//! ```ignore
//! let rate = provider.get_current_rate().await;
//! if rate.is_fallback() {
//!     // upstream unavailable, 95.00/g served
//! }
//!
//! // Admin override, current until it goes stale
//! provider.set_manual_rate(Decimal::from(120)).await?;
//! ```

#[macro_use]
extern crate log;

pub mod client_cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod observability;
pub mod pricing;
pub mod provider;
pub mod serialization;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod strategy;

// Re-exports for convenience
pub use client_cache::{ClientRateCache, IndicativeRate};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MetalsApiConfig, RateProviderConfig, RateSettings};
pub use error::{Error, FetchError, Result};
pub use fetcher::{MetalsApiFetcher, RateFetcher, StaticRateFetcher};
pub use pricing::{compute_price, PriceBreakdown, PricingInput, ProductPricing};
pub use provider::RateProvider;
pub use service::{OrderLine, OrderTotal, PricedLine, PricingService, Quote};
pub use snapshot::{RateLookup, RateSnapshot, RateSource, ResolvedRate};
pub use store::SnapshotStore;
pub use strategy::RefreshStrategy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
