//! Bar: one day's OHLCV observation for a symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daily OHLCV bar.
///
/// Field names accept the capitalized spelling (`Date`, `Close`, ...) used by
/// documents written before the records were typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(alias = "Date")]
    pub date: NaiveDate,
    #[serde(alias = "Open")]
    pub open: f64,
    #[serde(alias = "High")]
    pub high: f64,
    #[serde(alias = "Low")]
    pub low: f64,
    #[serde(alias = "Close")]
    pub close: f64,
    #[serde(alias = "Volume")]
    pub volume: u64,
}

/// A bar that cannot enter a series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {date}: field '{field}' is missing or not finite")]
    MissingField { date: NaiveDate, field: &'static str },

    #[error("bar {date}: close must be positive, got {close}")]
    NonPositiveClose { date: NaiveDate, close: f64 },
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Check that every required price field is present and usable.
    ///
    /// Providers encode a missing quote as NaN, so a non-finite field is
    /// treated as missing.
    pub fn validate(&self) -> Result<(), BarError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(BarError::MissingField {
                    date: self.date,
                    field,
                });
            }
        }
        if self.close <= 0.0 {
            return Err(BarError::NonPositiveClose {
                date: self.date,
                close: self.close,
            });
        }
        Ok(())
    }
}
