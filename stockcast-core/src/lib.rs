//! Stockcast Core: domain types, series merging, forecasting and ranking.
//!
//! This crate holds everything that decides *what* a refresh does:
//! - Domain types (bars, horizons, symbol records)
//! - Series merger and staleness gate
//! - Forecast orchestrator (per-horizon fan-out/join)
//! - Ranking engine
//! - Collaborator traits with their production and test implementations
//!   (store gateway, market data source, clock, log sink)

pub mod clock;
pub mod data;
pub mod domain;
pub mod forecast;
pub mod log_sink;
pub mod merge;
pub mod ranking;
pub mod staleness;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use log_sink::{FileLogSink, LogSink, MemoryLogSink};
pub use merge::{merge, MergeError, MergeOutcome};
pub use ranking::{top_n, Ranked, RankingKey};
pub use staleness::StalenessGate;
