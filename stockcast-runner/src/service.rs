//! Wiring: builds the driver, read API and snapshot writer from a config.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use stockcast_core::data::{CircuitBreaker, DataError, MarketDataSource, YahooSettings, YahooSource};
use stockcast_core::domain::SymbolRecord;
use stockcast_core::forecast::{ForecastOrchestrator, Forecaster, LinearTrendForecaster};
use stockcast_core::store::{JsonFileStore, StoreError, StoreGateway};
use stockcast_core::{Clock, FileLogSink, LogSink, StalenessGate, SystemClock};
use thiserror::Error;
use tracing::info;

use crate::config::StockcastConfig;
use crate::driver::BatchDriver;
use crate::query::QueryService;
use crate::scheduler::Scheduler;
use crate::snapshot::{SnapshotSettings, SnapshotWriter};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to set up market data source: {0}")]
    Source(#[from] DataError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Collaborators a service is built from.
pub struct Collaborators {
    pub store: Arc<dyn StoreGateway>,
    pub source: Arc<dyn MarketDataSource>,
    pub forecaster: Arc<dyn Forecaster>,
    pub clock: Arc<dyn Clock>,
    pub log_sink: Arc<dyn LogSink>,
}

impl Collaborators {
    /// Production collaborators: JSON store, Yahoo, linear trend, local clock.
    pub fn from_config(config: &StockcastConfig) -> Result<Self, ServiceError> {
        let breaker = Arc::new(CircuitBreaker::new(
            Duration::from_secs(config.provider.breaker_cooldown_secs),
            config.provider.breaker_failure_threshold,
        ));
        let settings = YahooSettings {
            request_timeout: Duration::from_secs(config.provider.request_timeout_secs),
            max_retries: config.provider.max_retries,
            ..YahooSettings::default()
        };
        Ok(Self {
            store: Arc::new(JsonFileStore::new(&config.paths.store_dir)),
            source: Arc::new(YahooSource::new(breaker, settings)?),
            forecaster: Arc::new(LinearTrendForecaster::new()),
            clock: Arc::new(SystemClock),
            log_sink: Arc::new(FileLogSink::new(&config.paths.log_file)),
        })
    }
}

pub struct StockcastService {
    config: StockcastConfig,
    store: Arc<dyn StoreGateway>,
    driver: BatchDriver,
    query: Arc<QueryService>,
    snapshots: SnapshotWriter,
}

impl StockcastService {
    pub fn from_config(config: StockcastConfig) -> Result<Self, ServiceError> {
        let parts = Collaborators::from_config(&config)?;
        Ok(Self::new(config, parts))
    }

    pub fn new(config: StockcastConfig, parts: Collaborators) -> Self {
        let orchestrator = ForecastOrchestrator::new(parts.forecaster, config.orchestrator());
        let driver = BatchDriver::new(Arc::clone(&parts.store), parts.source, orchestrator)
            .with_gate(StalenessGate::new(config.staleness.prediction_cadence_days))
            .with_clock(Arc::clone(&parts.clock))
            .with_log_sink(parts.log_sink)
            .with_horizons(config.forecast.horizons.clone())
            .with_backfill_years(config.backfill_years);
        let query = Arc::new(QueryService::new(Arc::clone(&parts.store)).with_clock(parts.clock));
        let snapshots = SnapshotWriter::new(
            Arc::clone(&query),
            &config.paths.snapshot_dir,
            SnapshotSettings {
                trending_days: config.snapshots.trending_days,
                top_days: config.snapshots.top_days,
                size: config.snapshots.size,
            },
        );
        Self {
            config,
            store: parts.store,
            driver,
            query,
            snapshots,
        }
    }

    pub fn config(&self) -> &StockcastConfig {
        &self.config
    }

    pub fn driver(&self) -> &BatchDriver {
        &self.driver
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    pub fn snapshots(&self) -> &SnapshotWriter {
        &self.snapshots
    }

    /// Register a symbol and create its empty record. Returns false if the
    /// symbol was already registered; an existing record is left untouched.
    pub fn add_symbol(&self, symbol: &str, name: &str, icon_url: &str) -> Result<bool, StoreError> {
        match self.store.get_record(symbol) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.store
                    .put_record(symbol, &SymbolRecord::new(symbol, name, icon_url))?;
            }
            Err(e) => return Err(e),
        }
        let added = self.store.register_ticker(symbol)?;
        info!(symbol, added, "symbol registered");
        Ok(added)
    }

    /// Start the update and snapshot jobs on a scheduler. Cancelling the
    /// scheduler's token also stops a running batch after its current symbol.
    pub fn start_daemon(self: &Arc<Self>) -> io::Result<Scheduler> {
        let mut scheduler = Scheduler::new();

        let service = Arc::clone(self);
        let token = scheduler.token();
        scheduler.spawn("update", self.config.update_interval(), move || {
            service.driver.run_until(&token).map(|_| ())
        })?;

        let service = Arc::clone(self);
        scheduler.spawn("snapshot", self.config.snapshot_interval(), move || {
            service.snapshots.refresh().map(|_| ())
        })?;

        Ok(scheduler)
    }
}
