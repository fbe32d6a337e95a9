//! Property tests for the series merger.
//!
//! Uses proptest to verify:
//! 1. Monotonicity: the series is strictly increasing after every merge
//! 2. Idempotence: merging the same inputs twice changes nothing the second time
//! 3. Atomicity: a rejected batch leaves the record untouched

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use stockcast_core::domain::{Bar, SymbolRecord};
use stockcast_core::{merge, MergeError, MergeOutcome};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

/// Strictly increasing day offsets from `base_date`.
fn arb_offsets(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1..5_i64, 0..max_len).prop_map(|gaps| {
        gaps.iter()
            .scan(0_i64, |acc, g| {
                *acc += g;
                Some(*acc)
            })
            .collect()
    })
}

fn arb_close() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn bars_at(offsets: &[i64], close: f64) -> Vec<Bar> {
    offsets
        .iter()
        .map(|&o| {
            let date = base_date() + Duration::days(o);
            Bar::new(date, close, close + 1.0, close - 0.5, close, 1_000)
        })
        .collect()
}

fn record_with(offsets: &[i64]) -> SymbolRecord {
    let mut r = SymbolRecord::new("X", "X Corp", "");
    r.series = bars_at(offsets, 100.0);
    r.last_data_update_date = r.series.last().map(|b| b.date);
    r
}

// ── 1. Monotonicity ──────────────────────────────────────────────────

proptest! {
    /// Overlapping fetches never produce duplicates or reordering.
    #[test]
    fn series_stays_strictly_increasing(
        stored in arb_offsets(20),
        fetched in arb_offsets(20),
        shift in 0..30_i64,
        close in arb_close(),
    ) {
        let mut record = record_with(&stored);
        let fetched: Vec<i64> = fetched.iter().map(|o| o + shift).collect();
        let as_of = base_date() + Duration::days(200);

        let _ = merge(&mut record, &bars_at(&fetched, close), as_of);
        prop_assert!(record.is_monotonic());
    }
}

// ── 2. Idempotence ───────────────────────────────────────────────────

proptest! {
    /// The second merge of identical inputs is a no-op.
    #[test]
    fn merge_is_idempotent(
        stored in arb_offsets(10),
        extra in arb_offsets(10),
        close in arb_close(),
    ) {
        let mut record = record_with(&stored);
        let last = stored.last().copied().unwrap_or(0);
        let fetched: Vec<i64> = extra.iter().map(|o| o + last).collect();
        let as_of = base_date() + Duration::days(last + 100);
        let bars = bars_at(&fetched, close);

        merge(&mut record, &bars, as_of).unwrap();
        let after_first = record.clone();

        let second = merge(&mut record, &bars, as_of).unwrap();
        if after_first.last_data_update_date == Some(as_of) {
            prop_assert_eq!(second, MergeOutcome::AlreadyCurrent);
        }
        prop_assert_eq!(&record, &after_first);
    }
}

// ── 3. Atomicity ─────────────────────────────────────────────────────

proptest! {
    /// A batch containing one malformed bar is rejected whole.
    #[test]
    fn malformed_bar_rejects_whole_batch(
        stored in arb_offsets(10),
        count in 2..8_usize,
        bad_index in 0..8_usize,
    ) {
        let mut record = record_with(&stored);
        let before = record.clone();
        let last = stored.last().copied().unwrap_or(0);
        let offsets: Vec<i64> = (1..=count as i64).map(|i| last + i).collect();
        let mut bars = bars_at(&offsets, 50.0);
        let bad = bad_index % count;
        bars[bad].close = f64::NAN;

        let result = merge(&mut record, &bars, base_date() + Duration::days(last + 30));
        prop_assert!(matches!(result, Err(MergeError::MalformedBar(_))));
        prop_assert_eq!(record, before);
    }
}

#[test]
fn appends_two_new_days() {
    let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
    let mut record = SymbolRecord::new("X", "X Corp", "");
    record.series = (2..=10)
        .map(|day| Bar::new(d(day), 10.0, 11.0, 9.0, 10.5, 100))
        .collect();
    record.last_data_update_date = Some(d(10));
    let len_before = record.series.len();

    let fetched = vec![
        Bar::new(d(11), 10.5, 11.5, 10.0, 11.0, 120),
        Bar::new(d(12), 11.0, 12.0, 10.5, 11.5, 130),
    ];
    let outcome = merge(&mut record, &fetched, d(12)).unwrap();

    assert_eq!(outcome, MergeOutcome::Appended { appended: 2 });
    assert_eq!(record.last_data_update_date, Some(d(12)));
    assert_eq!(record.series.len(), len_before + 2);
}
