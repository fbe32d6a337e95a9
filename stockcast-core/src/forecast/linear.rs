//! Least-squares trend forecaster.

use super::{ForecastError, ForecastOutput, Forecaster};
use crate::domain::Bar;
use chrono::{Duration, NaiveDate};

/// Fits a straight line through closing prices against calendar days and
/// extrapolates it to the horizon end date.
///
/// The horizon end date is `as_of + floor(365 * months / 12)` days. The
/// reference price is the fitted value at `as_of`, not the last close, so the
/// growth figure compares two points on the same curve.
#[derive(Debug, Clone, Default)]
pub struct LinearTrendForecaster {
    /// Only fit bars within this many days before `as_of`. `None` uses all bars.
    pub lookback_days: Option<i64>,
}

impl LinearTrendForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookback(days: i64) -> Self {
        Self {
            lookback_days: Some(days),
        }
    }

    pub fn horizon_days(months: u32) -> i64 {
        (365.0 * (months as f64 / 12.0)) as i64
    }
}

impl Forecaster for LinearTrendForecaster {
    fn name(&self) -> &str {
        "linear_trend"
    }

    fn forecast(
        &self,
        training: &[Bar],
        horizon_months: u32,
        as_of: NaiveDate,
    ) -> Result<ForecastOutput, ForecastError> {
        let window = match self.lookback_days {
            Some(days) => {
                let from = as_of - Duration::days(days);
                let start = training.partition_point(|b| b.date < from);
                &training[start..]
            }
            None => training,
        };

        if window.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                available: window.len(),
            });
        }

        let origin = window[0].date;
        let xs: Vec<f64> = window
            .iter()
            .map(|b| (b.date - origin).num_days() as f64)
            .collect();
        let n = window.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = window.iter().map(|b| b.close).sum::<f64>() / n;

        let (sxx, sxy) = xs
            .iter()
            .zip(window)
            .fold((0.0, 0.0), |(sxx, sxy), (x, bar)| {
                let dx = x - mean_x;
                (sxx + dx * dx, sxy + dx * (bar.close - mean_y))
            });

        if sxx == 0.0 {
            return Err(ForecastError::Degenerate(
                "all training bars share one date".into(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let fitted = |date: NaiveDate| intercept + slope * (date - origin).num_days() as f64;

        let target = as_of + Duration::days(Self::horizon_days(horizon_months));
        let output = ForecastOutput {
            predicted_value: fitted(target),
            reference_price: fitted(as_of),
        };

        if !output.predicted_value.is_finite() || !output.reference_price.is_finite() {
            return Err(ForecastError::NonFinite);
        }
        Ok(output)
    }
}
