//! Batch update driver: refreshes every symbol in the universe.
//!
//! Per symbol, in order:
//! 1. Load the record from the store
//! 2. If data-stale, fetch bars after the last stored bar and merge them
//! 3. If prediction-stale, run the forecast orchestrator
//! 4. Persist the record if anything changed
//!
//! Symbols are processed sequentially. A failure for one symbol is recorded in
//! its outcome and logged; it never stops the batch. Cancellation is checked
//! between symbols, so the symbol in flight always finishes.

use chrono::{Months, NaiveDate};
use std::sync::Arc;
use std::time::Instant;
use stockcast_core::data::{DataError, MarketDataSource};
use stockcast_core::domain::{Horizon, SymbolRecord, CANONICAL_HORIZONS};
use stockcast_core::forecast::{ForecastOrchestrator, ForecastTaskError};
use stockcast_core::store::{StoreError, StoreGateway};
use stockcast_core::{merge, Clock, LogSink, MemoryLogSink, MergeError, MergeOutcome};
use stockcast_core::{StalenessGate, SystemClock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scheduler::CancelToken;

/// Why one symbol's refresh failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    #[error("symbol {symbol} is not in the store")]
    NotFound { symbol: String },

    #[error("failed to load record: {0}")]
    Load(StoreError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] DataError),

    #[error("merge rejected: {0}")]
    Merge(#[from] MergeError),

    #[error("failed to persist record: {0}")]
    Store(StoreError),

    #[error("every forecast horizon failed: {}", horizon_keys(.errors))]
    ForecastFailed { errors: Vec<ForecastTaskError> },
}

impl UpdateError {
    /// Short, stable error kind for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::NotFound { .. } => "not_found",
            UpdateError::Load(_) => "store_read",
            UpdateError::Fetch(_) => "fetch",
            UpdateError::Merge(_) => "merge",
            UpdateError::Store(_) => "store_write",
            UpdateError::ForecastFailed { .. } => "forecast",
        }
    }
}

/// Comma-separated keys of the failed horizons, e.g. `3years, 5years`.
pub fn horizon_keys(errors: &[ForecastTaskError]) -> String {
    errors
        .iter()
        .map(|e| e.horizon.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// What changed for a symbol that was written back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    pub bars_appended: usize,
    /// Horizons in the new predictions map, or `None` if predictions were
    /// not recomputed.
    pub horizons_refreshed: Option<usize>,
    /// Horizons that failed while the rest succeeded.
    pub forecast_errors: Vec<ForecastTaskError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolStatus {
    Updated(UpdateSummary),
    /// Nothing was due or nothing new arrived; the record was not rewritten.
    Skipped,
    Failed(UpdateError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub status: SymbolStatus,
}

/// Outcomes of one batch, in universe order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub as_of: NaiveDate,
    pub outcomes: Vec<SymbolOutcome>,
    /// The batch stopped early; symbols after the last outcome were not visited.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, SymbolStatus::Updated(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, SymbolStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, SymbolStatus::Failed(_)))
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolStatus> {
        self.outcomes
            .iter()
            .find(|o| o.symbol == symbol)
            .map(|o| &o.status)
    }

    fn count(&self, pred: impl Fn(&SymbolStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

pub struct BatchDriver {
    store: Arc<dyn StoreGateway>,
    source: Arc<dyn MarketDataSource>,
    orchestrator: ForecastOrchestrator,
    gate: StalenessGate,
    clock: Arc<dyn Clock>,
    log_sink: Arc<dyn LogSink>,
    horizons: Vec<Horizon>,
    backfill_years: u32,
}

impl BatchDriver {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        source: Arc<dyn MarketDataSource>,
        orchestrator: ForecastOrchestrator,
    ) -> Self {
        Self {
            store,
            source,
            orchestrator,
            gate: StalenessGate::default(),
            clock: Arc::new(SystemClock),
            log_sink: Arc::new(MemoryLogSink::new()),
            horizons: CANONICAL_HORIZONS.to_vec(),
            backfill_years: 10,
        }
    }

    pub fn with_gate(mut self, gate: StalenessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn with_horizons(mut self, horizons: Vec<Horizon>) -> Self {
        self.horizons = horizons;
        self
    }

    pub fn with_backfill_years(mut self, years: u32) -> Self {
        self.backfill_years = years;
        self
    }

    /// Refresh the whole stored universe as of the clock's today.
    pub fn run(&self) -> Result<BatchReport, StoreError> {
        self.run_until(&CancelToken::new())
    }

    /// Like [`run`](Self::run), stopping between symbols once `cancel` fires.
    pub fn run_until(&self, cancel: &CancelToken) -> Result<BatchReport, StoreError> {
        let universe = self.store.ticker_list()?;
        Ok(self.run_batch_until(&universe, self.clock.today(), cancel))
    }

    /// Refresh each symbol of `universe` as of `as_of`.
    pub fn run_batch(&self, universe: &[String], as_of: NaiveDate) -> BatchReport {
        self.run_batch_until(universe, as_of, &CancelToken::new())
    }

    pub fn run_batch_until(
        &self,
        universe: &[String],
        as_of: NaiveDate,
        cancel: &CancelToken,
    ) -> BatchReport {
        let started = Instant::now();
        if let Err(e) = self.log_sink.clear() {
            warn!(error = %e, "failed to clear run log");
        }
        info!(%as_of, symbols = universe.len(), source = self.source.name(), "batch started");

        let mut outcomes = Vec::with_capacity(universe.len());
        let mut cancelled = false;
        for symbol in universe {
            if cancel.is_cancelled() {
                info!(
                    %as_of,
                    done = outcomes.len(),
                    remaining = universe.len() - outcomes.len(),
                    "batch cancelled"
                );
                cancelled = true;
                break;
            }
            let status = match self.update_symbol(symbol, as_of) {
                Ok(Some(summary)) => SymbolStatus::Updated(summary),
                Ok(None) => SymbolStatus::Skipped,
                Err(err) => SymbolStatus::Failed(err),
            };
            self.record_outcome(symbol, &status, as_of);
            outcomes.push(SymbolOutcome {
                symbol: symbol.clone(),
                status,
            });
        }

        let report = BatchReport {
            as_of,
            outcomes,
            cancelled,
        };
        info!(
            %as_of,
            total = report.outcomes.len(),
            cancelled,
            updated = report.updated(),
            skipped = report.skipped(),
            failed = report.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
        self.append_log(&format!(
            "{as_of} batch {}: {} symbols, {} updated, {} skipped, {} failed",
            if cancelled { "cancelled" } else { "complete" },
            report.outcomes.len(),
            report.updated(),
            report.skipped(),
            report.failed()
        ));
        report
    }

    /// Refresh one symbol. `Ok(None)` means nothing was written.
    pub fn update_symbol(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<UpdateSummary>, UpdateError> {
        let mut record = self.store.get_record(symbol).map_err(|e| match e {
            StoreError::NotFound { symbol } => UpdateError::NotFound { symbol },
            other => UpdateError::Load(other),
        })?;

        let mut summary = UpdateSummary::default();
        let mut changed = false;

        if self.gate.needs_data_refresh(&record, as_of) {
            let from = self.fetch_start(&record, as_of);
            let bars = self.source.fetch_bars(symbol, from, as_of)?;
            debug!(symbol, %from, %as_of, fetched = bars.len(), "bars fetched");
            if let MergeOutcome::Appended { appended } = merge(&mut record, &bars, as_of)? {
                summary.bars_appended = appended;
                changed = true;
            }
        }

        let mut forecast_failure = None;
        if self.gate.needs_prediction_refresh(&record, as_of) {
            let refresh = self
                .orchestrator
                .refresh_predictions(&record, &self.horizons, as_of);
            if refresh.is_total_failure() {
                forecast_failure = Some(refresh.errors);
            } else {
                summary.horizons_refreshed = Some(refresh.predictions.len());
                summary.forecast_errors = refresh.errors;
                record.predictions = refresh.predictions;
                record.last_predictions_update_date = Some(as_of);
                changed = true;
            }
        }

        // Appended bars are kept even when every forecast failed.
        if changed {
            self.store
                .put_record(symbol, &record)
                .map_err(UpdateError::Store)?;
        }

        match forecast_failure {
            Some(errors) => Err(UpdateError::ForecastFailed { errors }),
            None if changed => Ok(Some(summary)),
            None => Ok(None),
        }
    }

    /// First date to request: the day after the last stored bar, or the start
    /// of the backfill window for a record with no history.
    fn fetch_start(&self, record: &SymbolRecord, as_of: NaiveDate) -> NaiveDate {
        match record.last_bar() {
            Some(bar) => bar.date.succ_opt().unwrap_or(bar.date),
            None => as_of
                .checked_sub_months(Months::new(self.backfill_years * 12))
                .unwrap_or(NaiveDate::MIN),
        }
    }

    fn record_outcome(&self, symbol: &str, status: &SymbolStatus, as_of: NaiveDate) {
        let line = match status {
            SymbolStatus::Updated(s) => {
                info!(
                    symbol,
                    bars_appended = s.bars_appended,
                    horizons = s.horizons_refreshed,
                    forecast_errors = s.forecast_errors.len(),
                    "symbol updated"
                );
                let predictions = match s.horizons_refreshed {
                    Some(n) if s.forecast_errors.is_empty() => format!(", {n} horizons"),
                    Some(n) => format!(
                        ", {n} horizons, failed: {}",
                        horizon_keys(&s.forecast_errors)
                    ),
                    None => String::new(),
                };
                format!(
                    "{as_of} {symbol}: updated (+{} bars{predictions})",
                    s.bars_appended
                )
            }
            SymbolStatus::Skipped => {
                debug!(symbol, "symbol up to date");
                format!("{as_of} {symbol}: up to date")
            }
            SymbolStatus::Failed(err) => {
                warn!(symbol, kind = err.kind(), cause = %err, "symbol update failed");
                format!("{as_of} {symbol}: FAILED [{}] {err}", err.kind())
            }
        };
        self.append_log(&line);
    }

    fn append_log(&self, line: &str) {
        if let Err(e) = self.log_sink.append(line) {
            warn!(error = %e, "failed to append to run log");
        }
    }
}
