//! Ranking engine: orders symbol records by a growth metric.
//!
//! Two metrics are supported:
//! - trailing growth of the close over the last `days` calendar days of the
//!   series (the window `[last - days, last]`, inclusive)
//! - predicted percent increase for one horizon
//!
//! Records the metric cannot be computed for are excluded, never padded.
//! Sorting is descending and stable, so ties keep input order.

use crate::domain::{round2, Horizon, SymbolRecord};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Which metric to rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RankingKey {
    TrailingGrowth { days: i64 },
    PredictedGrowth { horizon: Horizon },
}

impl RankingKey {
    /// Default window for the "trending" list.
    pub const TRENDING: RankingKey = RankingKey::TrailingGrowth { days: 7 };
    /// Default window for the "top" list.
    pub const TOP: RankingKey = RankingKey::TrailingGrowth { days: 30 };

    pub fn predicted(months: u32) -> Self {
        RankingKey::PredictedGrowth {
            horizon: Horizon::from_months(months),
        }
    }

    /// The metric for `record`, or `None` if it cannot be ranked.
    pub fn metric(&self, record: &SymbolRecord) -> Option<f64> {
        match *self {
            RankingKey::TrailingGrowth { days } => trailing_growth(record, days),
            RankingKey::PredictedGrowth { horizon } => predicted_growth(record, horizon),
        }
    }
}

/// A record paired with the metric it was ranked by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked<'a> {
    pub record: &'a SymbolRecord,
    pub metric: f64,
}

/// Percent change of the close across the trailing window, rounded to 2 dp.
///
/// Needs at least two bars in the window. A window reaching past the
/// earliest representable date covers the whole series.
pub fn trailing_growth(record: &SymbolRecord, days: i64) -> Option<f64> {
    let last = record.last_bar()?.date;
    let from = Duration::try_days(days.max(0))
        .and_then(|window| last.checked_sub_signed(window))
        .unwrap_or(NaiveDate::MIN);
    growth_between(record, from, last)
}

/// Percent change from the first to the last close in `[from, to]`, rounded
/// to 2 dp. Needs at least two bars in the range.
pub fn growth_between(record: &SymbolRecord, from: NaiveDate, to: NaiveDate) -> Option<f64> {
    let window = record.bars_between(from, to);
    if window.len() < 2 {
        return None;
    }
    let start = window[0].close;
    let end = window[window.len() - 1].close;
    if start <= 0.0 {
        return None;
    }
    let growth = round2((end - start) / start * 100.0);
    growth.is_finite().then_some(growth)
}

/// Stored percent increase for `horizon`, if present and finite.
pub fn predicted_growth(record: &SymbolRecord, horizon: Horizon) -> Option<f64> {
    record
        .predictions
        .get(&horizon)
        .map(|f| f.percent_increase)
        .filter(|v| v.is_finite())
}

/// The first `n` records by descending metric.
///
/// Unrankable records are dropped. Equal metrics keep their input order.
pub fn top_n<'a, I>(records: I, key: RankingKey, n: usize) -> Vec<Ranked<'a>>
where
    I: IntoIterator<Item = &'a SymbolRecord>,
{
    let mut ranked: Vec<Ranked<'a>> = records
        .into_iter()
        .filter_map(|record| {
            key.metric(record)
                .map(|metric| Ranked { record, metric })
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.metric.total_cmp(&a.metric));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Forecast};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn with_growth(symbol: &str, pct: f64) -> SymbolRecord {
        let mut r = SymbolRecord::new(symbol, symbol, "");
        r.predictions.insert(
            Horizon::Year,
            Forecast {
                predicted_value: 100.0 + pct,
                percent_increase: pct,
            },
        );
        r
    }

    fn with_closes(symbol: &str, closes: &[(u32, f64)]) -> SymbolRecord {
        let mut r = SymbolRecord::new(symbol, symbol, "");
        r.series = closes
            .iter()
            .map(|&(day, c)| Bar::new(d(day), c, c, c, c, 100))
            .collect();
        r
    }

    #[test]
    fn ties_keep_input_order() {
        let records = vec![
            with_growth("A", 5.0),
            with_growth("B", 5.0),
            with_growth("C", 3.0),
        ];
        let key = RankingKey::predicted(12);

        let top2: Vec<_> = top_n(&records, key, 2)
            .iter()
            .map(|r| r.record.symbol.as_str())
            .collect();
        assert_eq!(top2, vec!["A", "B"]);

        assert_eq!(top_n(&records, key, 10).len(), 3);
    }

    #[test]
    fn missing_horizon_is_excluded() {
        let mut records = vec![with_growth("A", 1.0), with_growth("B", 2.0)];
        records[0].predictions.clear();
        let ranked = top_n(&records, RankingKey::predicted(12), 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].record.symbol, "B");
    }

    #[test]
    fn trailing_growth_uses_window_from_last_bar() {
        // Window for 7 days ending Jan 10 is [Jan 3, Jan 10].
        let r = with_closes("X", &[(1, 50.0), (3, 100.0), (8, 105.0), (10, 110.0)]);
        assert_eq!(trailing_growth(&r, 7), Some(10.0));
        assert_eq!(trailing_growth(&r, 30), Some(120.0));
    }

    #[test]
    fn single_bar_window_is_unrankable() {
        let r = with_closes("X", &[(1, 50.0), (10, 110.0)]);
        assert_eq!(trailing_growth(&r, 7), None);
        assert_eq!(trailing_growth(&SymbolRecord::new("E", "", ""), 7), None);
        assert!(top_n([&r], RankingKey::TRENDING, 3).is_empty());
    }

    #[test]
    fn growth_between_explicit_range() {
        let r = with_closes("X", &[(1, 50.0), (3, 100.0), (8, 105.0), (10, 110.0)]);
        assert_eq!(growth_between(&r, d(2), d(8)), Some(5.0));
        assert_eq!(growth_between(&r, d(9), d(31)), None);
    }

    #[test]
    fn oversized_window_covers_whole_series() {
        let r = with_closes("X", &[(1, 50.0), (3, 100.0), (10, 110.0)]);
        assert_eq!(trailing_growth(&r, 100_000_000), Some(120.0));
        assert_eq!(trailing_growth(&r, i64::MAX), Some(120.0));
        assert_eq!(top_n([&r], RankingKey::TrailingGrowth { days: i64::MAX }, 1).len(), 1);
    }

    #[test]
    fn growth_is_rounded() {
        let r = with_closes("X", &[(1, 3.0), (2, 4.0)]);
        assert_eq!(trailing_growth(&r, 7), Some(33.33));
    }

    #[test]
    fn zero_n_returns_nothing() {
        let records = vec![with_growth("A", 1.0)];
        assert!(top_n(&records, RankingKey::predicted(12), 0).is_empty());
    }

    #[test]
    fn key_serializes_with_horizon_string() {
        let json = serde_json::to_string(&RankingKey::predicted(36)).unwrap();
        assert_eq!(json, r#"{"kind":"predicted_growth","horizon":"3years"}"#);
    }
}
