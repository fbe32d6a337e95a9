//! Stockcast Runner: batch refresh, read API, snapshots and scheduling.
//!
//! This crate builds on `stockcast-core` to provide:
//! - TOML configuration
//! - Batch update driver with per-symbol fault isolation
//! - Read API (top, future top, recommendations, single-symbol lookups)
//! - Snapshot writer for the trending and top lists
//! - Periodic scheduler with cooperative cancellation

pub mod config;
pub mod driver;
pub mod query;
pub mod scheduler;
pub mod service;
pub mod snapshot;

pub use config::{ConfigError, StockcastConfig};
pub use driver::{BatchDriver, BatchReport, SymbolOutcome, SymbolStatus, UpdateError, UpdateSummary};
pub use query::{PortfolioSummary, QueryError, QueryService, RankedStock};
pub use scheduler::{CancelToken, Scheduler};
pub use service::{Collaborators, ServiceError, StockcastService};
pub use snapshot::{SnapshotError, SnapshotSettings, SnapshotWriter, TopSnapshot, TrendingSnapshot};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn shared_services_are_send_sync() {
        assert_send::<BatchDriver>();
        assert_sync::<BatchDriver>();
        assert_send::<QueryService>();
        assert_sync::<QueryService>();
        assert_send::<SnapshotWriter>();
        assert_sync::<SnapshotWriter>();
        assert_send::<StockcastService>();
        assert_sync::<StockcastService>();
    }

    #[test]
    fn reports_are_send() {
        assert_send::<BatchReport>();
        assert_send::<UpdateError>();
        assert_send::<CancelToken>();
        assert_sync::<CancelToken>();
    }
}
