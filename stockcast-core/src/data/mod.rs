//! Market data sources

pub mod circuit_breaker;
pub mod provider;
pub mod scripted;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{DataError, MarketDataSource};
pub use scripted::{FetchCall, ScriptedSource};
pub use yahoo::{YahooSettings, YahooSource};
