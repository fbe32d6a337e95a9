//! Forecasting seam and the multi-horizon orchestrator.
//!
//! The forecasting procedure itself is opaque to the rest of the system: any
//! type implementing [`Forecaster`] can be plugged into the orchestrator, and
//! plain closures implement it too so tests can script failures and delays.

pub mod linear;
pub mod orchestrator;

pub use linear::LinearTrendForecaster;
pub use orchestrator::{
    ForecastOrchestrator, ForecastTaskError, OrchestratorConfig, PredictionRefresh, TaskFailure,
};

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;

/// What a forecasting function returns for one horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastOutput {
    /// Value at the horizon's end date.
    pub predicted_value: f64,
    /// The model's price at `as_of`, the baseline for percent growth.
    pub reference_price: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient training data: need {needed} bars, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("degenerate training data: {0}")]
    Degenerate(String),

    #[error("forecast produced a non-finite value")]
    NonFinite,

    #[error("forecast failed: {0}")]
    Failed(String),
}

/// An opaque forecasting function.
///
/// Implementations must be deterministic for identical inputs; the orchestrator
/// relies on this to make serial and parallel runs interchangeable.
pub trait Forecaster: Send + Sync {
    /// Human-readable name of this forecaster.
    fn name(&self) -> &str;

    /// Forecast `horizon_months` ahead of `as_of` from bars strictly before `as_of`.
    fn forecast(
        &self,
        training: &[Bar],
        horizon_months: u32,
        as_of: NaiveDate,
    ) -> Result<ForecastOutput, ForecastError>;
}

impl<F> Forecaster for F
where
    F: Fn(&[Bar], u32, NaiveDate) -> Result<ForecastOutput, ForecastError> + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn forecast(
        &self,
        training: &[Bar],
        horizon_months: u32,
        as_of: NaiveDate,
    ) -> Result<ForecastOutput, ForecastError> {
        self(training, horizon_months, as_of)
    }
}
