//! Error types for pricing and rate acquisition.

use std::fmt;

/// Result type for pricing and rate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the crate.
///
/// Rate reads through [`RateProvider::get_current_rate`](crate::RateProvider::get_current_rate)
/// never surface these: acquisition failures are converted into a fallback
/// snapshot at the provider boundary. Everything else returns `Result<T>`.
#[derive(Debug, Clone)]
pub enum Error {
    /// Pricing input or a manual rate failed validation.
    ///
    /// Raised when:
    /// - weight, making charge, profit parameter or fixed price is negative
    /// - the rate handed to a dynamic pricing mode is zero or negative
    /// - a product record has neither a fixed price nor a weight, or both
    ///   markup conventions at once
    /// - minor-unit arithmetic overflows `i64`
    ValidationError(String),

    /// Snapshot store error (Redis connection lost, pool exhausted, etc).
    ///
    /// **Recovery:** the provider falls back to the default rate on reads.
    /// Manual overrides surface it to the caller.
    BackendError(String),

    /// Serialization failed when encoding a snapshot for the store.
    SerializationError(String),

    /// Deserialization failed when decoding a stored snapshot.
    ///
    /// Indicates a corrupted or truncated store entry.
    DeserializationError(String),

    /// Stored entry has a bad magic header.
    ///
    /// Returned when the bytes were not written by this crate.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and stored snapshot.
    ///
    /// Expected during deployments that change `RateSnapshot`; the provider
    /// treats the entry as unreadable and refreshes.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from stored entry)
        found: u32,
    },

    /// Configuration error while loading settings or building a client.
    ConfigError(String),

    /// Operation not supported by this store.
    NotImplemented(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Snapshot version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Failure modes of an upstream rate fetch.
///
/// Kept separate from [`Error`] so fetchers return a precise, typed reason
/// which the provider logs before substituting the fallback rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS or TLS failure.
    Network(String),

    /// Request exceeded the configured timeout.
    Timeout,

    /// Upstream answered with a non-2xx status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Body could not be parsed, or the quoted value is not usable.
    Malformed(String),

    /// `rates` map has no entry for the requested ticker.
    MissingTicker(String),

    /// Upstream reported an error in an otherwise successful response.
    Upstream(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {}", msg),
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Status { status, body } => {
                write!(f, "upstream returned {}: {}", status, body)
            }
            FetchError::Malformed(msg) => write!(f, "malformed response: {}", msg),
            FetchError::MissingTicker(ticker) => write!(f, "no rate for ticker {}", ticker),
            FetchError::Upstream(msg) => write!(f, "upstream error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}
