//! Market data source trait and structured error types.
//!
//! The MarketDataSource trait abstracts over data sources (Yahoo Finance,
//! scripted sources in tests) so the refresh driver never knows where bars
//! come from.

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for market data fetches.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Source of daily bars.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Daily bars for `symbol` with `from <= date <= to`, ascending.
    ///
    /// Only completed sessions are returned. A session still trading on `to`
    /// is left out and picked up by a later fetch.
    ///
    /// An empty vector is a normal answer (weekends, holidays); it is never an
    /// error.
    fn fetch_bars(&self, symbol: &str, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Bar>, DataError>;

    /// Check if the source is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
