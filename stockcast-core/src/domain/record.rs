//! SymbolRecord: the persisted document for one tradable symbol.

use super::bar::Bar;
use super::horizon::Horizon;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Predicted value for one horizon and its growth relative to the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    #[serde(alias = "value")]
    pub predicted_value: f64,
    pub percent_increase: f64,
}

/// Horizon-keyed forecasts.
pub type Predictions = BTreeMap<Horizon, Forecast>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    #[serde(alias = "ticker")]
    pub symbol: String,
    #[serde(default, alias = "stockName")]
    pub display_name: String,
    #[serde(default, rename = "iconURL")]
    pub icon_url: String,
    /// Strictly increasing by date.
    #[serde(default, alias = "historicalData")]
    pub series: Vec<Bar>,
    #[serde(default)]
    pub last_data_update_date: Option<NaiveDate>,
    #[serde(default)]
    pub predictions: Predictions,
    #[serde(default)]
    pub last_predictions_update_date: Option<NaiveDate>,
}

impl SymbolRecord {
    /// A freshly registered symbol with no data yet.
    pub fn new(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        icon_url: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            icon_url: icon_url.into(),
            series: Vec::new(),
            last_data_update_date: None,
            predictions: Predictions::new(),
            last_predictions_update_date: None,
        }
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.series.last()
    }

    /// Close of the most recent bar.
    pub fn current_price(&self) -> Option<f64> {
        self.last_bar().map(|b| b.close)
    }

    /// True if the series is strictly increasing by date.
    pub fn is_monotonic(&self) -> bool {
        self.series.windows(2).all(|w| w[0].date < w[1].date)
    }

    /// Bars whose date lies in `[from, to]`.
    pub fn bars_between(&self, from: NaiveDate, to: NaiveDate) -> &[Bar] {
        let start = self.series.partition_point(|b| b.date < from);
        let end = self.series.partition_point(|b| b.date <= to);
        if start >= end {
            &[]
        } else {
            &self.series[start..end]
        }
    }

    /// Bars strictly before `as_of`.
    pub fn bars_before(&self, as_of: NaiveDate) -> &[Bar] {
        let end = self.series.partition_point(|b| b.date < as_of);
        &self.series[..end]
    }
}
