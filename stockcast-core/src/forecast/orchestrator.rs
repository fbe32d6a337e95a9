//! Forecast orchestrator: fan-out/join of one forecast task per horizon.
//!
//! For one record the orchestrator:
//! 1. Builds one training set from bars strictly before `as_of`
//! 2. Spawns one task per horizon on a private rayon pool sized by `concurrency`
//! 3. Each task inserts its rounded forecast into a mutex-guarded result map
//! 4. Joins on a completion channel, giving up on tasks that exceed `task_timeout`
//!
//! A failing, panicking or timed-out task never affects its siblings; its
//! horizon is missing from the result and its error is reported alongside.
//! The pool is built per invocation so a stuck forecaster cannot starve the
//! next symbol's refresh.

use super::{ForecastError, Forecaster};
use crate::domain::{round2, Bar, Forecast, Horizon, Predictions, SymbolRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum horizon tasks in flight. `0` means one thread per horizon.
    pub concurrency: usize,
    /// How long the join waits for the next task to finish before giving up
    /// on every task still outstanding.
    pub task_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            task_timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorConfig {
    /// Serial execution, for deterministic tests.
    pub fn serial() -> Self {
        Self {
            concurrency: 1,
            ..Self::default()
        }
    }
}

/// Why a single horizon produced no forecast.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("reference price {0} is not positive")]
    InvalidReference(f64),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("worker pool unavailable: {0}")]
    PoolUnavailable(String),
}

/// A contained failure for one horizon.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("horizon {horizon} ({months} months): {failure}", months = .horizon.months())]
pub struct ForecastTaskError {
    pub horizon: Horizon,
    pub failure: TaskFailure,
}

/// Result of one orchestrated refresh: whatever succeeded plus per-horizon errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionRefresh {
    pub predictions: Predictions,
    pub errors: Vec<ForecastTaskError>,
}

impl PredictionRefresh {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Every requested horizon failed.
    pub fn is_total_failure(&self) -> bool {
        self.predictions.is_empty() && !self.errors.is_empty()
    }
}

/// Shared result map. `closed` is set when the join finishes so a task that
/// outlives its timeout cannot write into a map that has already been handed out.
#[derive(Default)]
struct ResultSlot {
    predictions: Predictions,
    closed: bool,
}

pub struct ForecastOrchestrator {
    forecaster: Arc<dyn Forecaster>,
    config: OrchestratorConfig,
}

impl ForecastOrchestrator {
    pub fn new(forecaster: Arc<dyn Forecaster>, config: OrchestratorConfig) -> Self {
        Self { forecaster, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn forecaster_name(&self) -> &str {
        self.forecaster.name()
    }

    /// Compute forecasts for `horizons` from `record`'s series as of `as_of`.
    ///
    /// Duplicate horizons are computed once. The record is not modified.
    pub fn refresh_predictions(
        &self,
        record: &SymbolRecord,
        horizons: &[Horizon],
        as_of: NaiveDate,
    ) -> PredictionRefresh {
        let horizons: BTreeSet<Horizon> = horizons.iter().copied().collect();
        if horizons.is_empty() {
            return PredictionRefresh::default();
        }

        let degree = match self.config.concurrency {
            0 => horizons.len(),
            n => n.min(horizons.len()),
        };

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(degree)
            .thread_name(|i| format!("forecast-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                let failure = TaskFailure::PoolUnavailable(e.to_string());
                return PredictionRefresh {
                    predictions: Predictions::new(),
                    errors: horizons
                        .into_iter()
                        .map(|horizon| ForecastTaskError {
                            horizon,
                            failure: failure.clone(),
                        })
                        .collect(),
                };
            }
        };

        let training: Arc<[Bar]> = record.bars_before(as_of).into();
        let slot = Arc::new(Mutex::new(ResultSlot::default()));
        let (tx, rx) = mpsc::channel::<(Horizon, Result<(), TaskFailure>)>();

        for &horizon in &horizons {
            let forecaster = Arc::clone(&self.forecaster);
            let training = Arc::clone(&training);
            let slot = Arc::clone(&slot);
            let tx = tx.clone();
            pool.spawn(move || {
                let outcome =
                    run_task(forecaster.as_ref(), &training, horizon, as_of).map(|forecast| {
                        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                        if !guard.closed {
                            guard.predictions.insert(horizon, forecast);
                        }
                    });
                // The receiver is gone once the join has timed out.
                let _ = tx.send((horizon, outcome));
            });
        }
        drop(tx);

        let mut pending = horizons;
        let mut errors = Vec::new();
        while !pending.is_empty() {
            match rx.recv_timeout(self.config.task_timeout) {
                Ok((horizon, outcome)) => {
                    pending.remove(&horizon);
                    match outcome {
                        Ok(()) => debug!(symbol = %record.symbol, %horizon, "forecast complete"),
                        Err(failure) => errors.push(ForecastTaskError { horizon, failure }),
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let failure = TaskFailure::TimedOut(self.config.task_timeout);
                    errors.extend(pending.iter().map(|&horizon| ForecastTaskError {
                        horizon,
                        failure: failure.clone(),
                    }));
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let failure = TaskFailure::Panicked("task exited without reporting".into());
                    errors.extend(pending.iter().map(|&horizon| ForecastTaskError {
                        horizon,
                        failure: failure.clone(),
                    }));
                    break;
                }
            }
        }

        let mut predictions = {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            guard.closed = true;
            std::mem::take(&mut guard.predictions)
        };
        // A timed-out task may have inserted between the timeout and the close.
        for err in &errors {
            predictions.remove(&err.horizon);
        }
        errors.sort_by_key(|e| e.horizon);

        for err in &errors {
            warn!(
                symbol = %record.symbol,
                kind = "forecast_task",
                horizon = %err.horizon,
                cause = %err.failure,
                "forecast task failed"
            );
        }

        PredictionRefresh {
            predictions,
            errors,
        }
    }
}

fn run_task(
    forecaster: &dyn Forecaster,
    training: &[Bar],
    horizon: Horizon,
    as_of: NaiveDate,
) -> Result<Forecast, TaskFailure> {
    let output = panic::catch_unwind(AssertUnwindSafe(|| {
        forecaster.forecast(training, horizon.months(), as_of)
    }))
    .map_err(|payload| TaskFailure::Panicked(panic_message(payload.as_ref())))??;

    if !output.predicted_value.is_finite() || !output.reference_price.is_finite() {
        return Err(ForecastError::NonFinite.into());
    }
    if output.reference_price <= 0.0 {
        return Err(TaskFailure::InvalidReference(output.reference_price));
    }

    let percent_increase =
        (output.predicted_value - output.reference_price) / output.reference_price * 100.0;
    Ok(Forecast {
        predicted_value: round2(output.predicted_value),
        percent_increase: round2(percent_increase),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CANONICAL_HORIZONS;
    use crate::forecast::ForecastOutput;

    fn record() -> SymbolRecord {
        let mut r = SymbolRecord::new("X", "", "");
        r.series = (1..=5)
            .map(|day| {
                let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
                Bar::new(date, 10.0, 10.0, 10.0, 10.0, 1)
            })
            .collect();
        r
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    /// Predicted value grows with the horizon; reference fixed at 10.
    fn growth(_: &[Bar], months: u32, _: NaiveDate) -> Result<ForecastOutput, ForecastError> {
        Ok(ForecastOutput {
            predicted_value: 10.0 + months as f64 / 3.0,
            reference_price: 10.0,
        })
    }

    #[test]
    fn percent_increase_is_rounded() {
        let orch = ForecastOrchestrator::new(Arc::new(growth), OrchestratorConfig::serial());
        let out = orch.refresh_predictions(&record(), &[Horizon::Months(3)], as_of());
        let f = out.predictions[&Horizon::Months(3)];
        assert_eq!(f.predicted_value, 11.0);
        assert_eq!(f.percent_increase, 10.0);

        let out = orch.refresh_predictions(&record(), &[Horizon::Year], as_of());
        assert_eq!(out.predictions[&Horizon::Year].percent_increase, 40.0);
    }

    #[test]
    fn training_excludes_as_of_bar() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_task = Arc::clone(&seen);
        let recording = move |training: &[Bar], _: u32, _: NaiveDate| {
            seen_in_task.lock().unwrap().push(training.len());
            growth(training, 3, as_of())
        };
        let orch = ForecastOrchestrator::new(Arc::new(recording), OrchestratorConfig::default());
        orch.refresh_predictions(&record(), &CANONICAL_HORIZONS, as_of());
        assert!(seen.lock().unwrap().iter().all(|&len| len == 4));
    }

    #[test]
    fn panicking_task_is_contained() {
        let flaky = |training: &[Bar], months: u32, as_of: NaiveDate| {
            if months == 6 {
                panic!("model blew up");
            }
            growth(training, months, as_of)
        };
        let orch = ForecastOrchestrator::new(Arc::new(flaky), OrchestratorConfig::default());
        let out = orch.refresh_predictions(&record(), &CANONICAL_HORIZONS, as_of());
        assert_eq!(out.predictions.len(), 5);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].horizon, Horizon::Months(6));
        assert!(matches!(out.errors[0].failure, TaskFailure::Panicked(ref m) if m == "model blew up"));
    }

    #[test]
    fn slow_task_times_out() {
        let slow = |training: &[Bar], months: u32, as_of: NaiveDate| {
            if months == 60 {
                std::thread::sleep(Duration::from_millis(500));
            }
            growth(training, months, as_of)
        };
        let config = OrchestratorConfig {
            concurrency: 0,
            task_timeout: Duration::from_millis(100),
        };
        let orch = ForecastOrchestrator::new(Arc::new(slow), config);
        let out = orch.refresh_predictions(&record(), &CANONICAL_HORIZONS, as_of());
        assert_eq!(out.predictions.len(), 5);
        assert!(!out.predictions.contains_key(&Horizon::Years(5)));
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(out.errors[0].failure, TaskFailure::TimedOut(_)));
    }

    #[test]
    fn non_positive_reference_is_a_task_failure() {
        let zero = |_: &[Bar], _: u32, _: NaiveDate| {
            Ok(ForecastOutput {
                predicted_value: 1.0,
                reference_price: 0.0,
            })
        };
        let orch = ForecastOrchestrator::new(Arc::new(zero), OrchestratorConfig::serial());
        let out = orch.refresh_predictions(&record(), &[Horizon::Year], as_of());
        assert!(out.is_total_failure());
        assert_eq!(out.errors[0].failure, TaskFailure::InvalidReference(0.0));
    }

    #[test]
    fn empty_horizon_list_is_empty_result() {
        let orch = ForecastOrchestrator::new(Arc::new(growth), OrchestratorConfig::default());
        let out = orch.refresh_predictions(&record(), &[], as_of());
        assert!(out.predictions.is_empty());
        assert!(out.is_complete());
    }

    #[test]
    fn error_message_names_months() {
        let err = ForecastTaskError {
            horizon: Horizon::Years(3),
            failure: TaskFailure::Forecast(ForecastError::Failed("boom".into())),
        };
        assert_eq!(err.to_string(), "horizon 3years (36 months): forecast failed: boom");
    }
}
