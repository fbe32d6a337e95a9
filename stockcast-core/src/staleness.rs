//! Staleness gate: cadence policies for data and prediction refreshes.

use crate::domain::SymbolRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default number of days between prediction refreshes.
pub const DEFAULT_PREDICTION_CADENCE_DAYS: i64 = 7;

/// Decides whether a record's data or predictions need a refresh.
///
/// The two policies are independent: a record can need new bars without new
/// predictions and the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessGate {
    pub prediction_cadence_days: i64,
}

impl Default for StalenessGate {
    fn default() -> Self {
        Self {
            prediction_cadence_days: DEFAULT_PREDICTION_CADENCE_DAYS,
        }
    }
}

impl StalenessGate {
    pub fn new(prediction_cadence_days: i64) -> Self {
        Self {
            prediction_cadence_days,
        }
    }

    /// Any calendar-day gap triggers a fetch attempt, even on non-trading days.
    pub fn needs_data_refresh(&self, record: &SymbolRecord, as_of: NaiveDate) -> bool {
        record.last_data_update_date != Some(as_of)
    }

    /// Predictions are recomputed once at least the cadence has elapsed.
    /// A record that never had predictions is always stale.
    pub fn needs_prediction_refresh(&self, record: &SymbolRecord, as_of: NaiveDate) -> bool {
        match record.last_predictions_update_date {
            None => true,
            Some(last) => (as_of - last).num_days() >= self.prediction_cadence_days,
        }
    }
}
