//! Refresh strategies for rate lookups.
//!
//! | Strategy | Fresh snapshot | Stale / missing snapshot | Use case |
//! |----------|----------------|--------------------------|----------|
//! | **Refresh** | Return | Fetch, fallback on failure | Default for every read |
//! | **Force** | Fetch anyway | Fetch, fallback on failure | Admin "refresh now" |
//! | **CacheOnly** | Return | Return stale, or fallback | Never touch upstream |

/// Strategy enum controlling when the provider goes upstream.
///
/// ```
/// use silver_rate_kit::strategy::RefreshStrategy;
///
/// assert_eq!(RefreshStrategy::default(), RefreshStrategy::Refresh);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RefreshStrategy {
    /// Serve the stored snapshot while it is within TTL, otherwise fetch.
    #[default]
    Refresh,

    /// Fetch upstream regardless of the stored snapshot's age.
    Force,

    /// Never fetch. A stale snapshot is returned tagged as stale; an empty
    /// store yields the fallback rate.
    CacheOnly,
}

impl std::fmt::Display for RefreshStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshStrategy::Refresh => write!(f, "Refresh"),
            RefreshStrategy::Force => write!(f, "Force"),
            RefreshStrategy::CacheOnly => write!(f, "CacheOnly"),
        }
    }
}
