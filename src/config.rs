//! Provider, upstream and client-cache configuration.
//!
//! Typed configs with builder-style setters are what the provider and
//! fetcher take. [`RateSettings`] is the flat, deserializable form loaded from
//! the environment (`SILVER_RATE_*`) or a TOML document.
//!
//! ```
//! use silver_rate_kit::config::RateSettings;
//!
//! # fn main() -> silver_rate_kit::Result<()> {
//! let settings = RateSettings::from_toml_str(r#"
//!     cache_ttl_secs = 3600
//!     fallback_rate = "92.50"
//!     api_key = "demo"
//! "#)?;
//!
//! assert_eq!(settings.provider_config().cache_ttl.as_secs(), 3600);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Maximum age of a stored snapshot before a refresh is attempted.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Rate served when no usable snapshot or upstream value exists (95.00/g).
pub const DEFAULT_FALLBACK_RATE: Decimal = Decimal::from_parts(9500, 0, 0, false, 2);

/// Default upstream endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://metals-api.com/api/latest";

/// Default timeout on the upstream request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable prefix for [`RateSettings::from_env`].
pub const ENV_PREFIX: &str = "SILVER_RATE";

/// Caching and fallback policy of the rate provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateProviderConfig {
    pub cache_ttl: Duration,
    /// Must be positive.
    pub fallback_rate: Decimal,
    /// On fetch failure, prefer a stale stored snapshot over the fallback rate.
    pub serve_stale_on_failure: bool,
    /// Allow at most one upstream refresh in flight per provider.
    pub single_flight: bool,
}

impl Default for RateProviderConfig {
    fn default() -> Self {
        RateProviderConfig {
            cache_ttl: DEFAULT_CACHE_TTL,
            fallback_rate: DEFAULT_FALLBACK_RATE,
            serve_stale_on_failure: false,
            single_flight: true,
        }
    }
}

impl RateProviderConfig {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_fallback_rate(mut self, rate: Decimal) -> Self {
        self.fallback_rate = rate;
        self
    }

    pub fn with_serve_stale_on_failure(mut self, enabled: bool) -> Self {
        self.serve_stale_on_failure = enabled;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// # Errors
    /// Returns `Error::ConfigError` if the fallback rate is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.fallback_rate <= Decimal::ZERO {
            return Err(Error::ConfigError(format!(
                "fallback rate must be positive, got {}",
                self.fallback_rate
            )));
        }
        Ok(())
    }
}

/// Upstream metals API settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetalsApiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Local currency the rate is quoted in, e.g. `INR`.
    pub base_currency: String,
    /// Metal ticker in the `rates` map, e.g. `XAG`.
    pub ticker: String,
    pub timeout: Duration,
}

impl Default for MetalsApiConfig {
    fn default() -> Self {
        MetalsApiConfig {
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: None,
            base_currency: "INR".to_string(),
            ticker: "XAG".to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl MetalsApiConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = ticker.into();
        self
    }

    pub fn with_base_currency(mut self, currency: impl Into<String>) -> Self {
        self.base_currency = currency.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Flat settings as loaded from the environment or a file.
///
/// Every field has a default, so an empty source yields the stock policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateSettings {
    pub cache_ttl_secs: u64,
    pub client_cache_ttl_secs: u64,
    pub fallback_rate: Decimal,
    pub serve_stale_on_failure: bool,
    pub single_flight: bool,
    pub api_endpoint: String,
    pub api_key: Option<String>,
    pub base_currency: String,
    pub ticker: String,
    pub http_timeout_secs: u64,
}

impl Default for RateSettings {
    fn default() -> Self {
        let provider = RateProviderConfig::default();
        let api = MetalsApiConfig::default();
        RateSettings {
            cache_ttl_secs: provider.cache_ttl.as_secs(),
            client_cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            fallback_rate: provider.fallback_rate,
            serve_stale_on_failure: provider.serve_stale_on_failure,
            single_flight: provider.single_flight,
            api_endpoint: api.endpoint,
            api_key: api.api_key,
            base_currency: api.base_currency,
            ticker: api.ticker,
            http_timeout_secs: api.timeout.as_secs(),
        }
    }
}

impl RateSettings {
    /// Load from `SILVER_RATE_*` environment variables, e.g.
    /// `SILVER_RATE_API_KEY`, `SILVER_RATE_CACHE_TTL_SECS`.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable cannot be parsed or the
    /// resulting policy is invalid.
    pub fn from_env() -> Result<Self> {
        let settings: RateSettings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    /// Load from a TOML document.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` on malformed TOML or invalid values.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings: RateSettings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    fn validated(self) -> Result<Self> {
        self.provider_config().validate()?;
        if self.ticker.trim().is_empty() {
            return Err(Error::ConfigError("ticker must not be empty".to_string()));
        }
        debug!(
            "Loaded rate settings: ttl={}s fallback={} ticker={} endpoint={}",
            self.cache_ttl_secs, self.fallback_rate, self.ticker, self.api_endpoint
        );
        Ok(self)
    }

    pub fn provider_config(&self) -> RateProviderConfig {
        RateProviderConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            fallback_rate: self.fallback_rate,
            serve_stale_on_failure: self.serve_stale_on_failure,
            single_flight: self.single_flight,
        }
    }

    pub fn metals_api_config(&self) -> MetalsApiConfig {
        MetalsApiConfig {
            endpoint: self.api_endpoint.clone(),
            api_key: self.api_key.clone(),
            base_currency: self.base_currency.clone(),
            ticker: self.ticker.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn client_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.client_cache_ttl_secs)
    }
}
