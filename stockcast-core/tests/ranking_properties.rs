//! Property tests for the ranking engine.
//!
//! Uses proptest to verify:
//! 1. Bounded output: `min(n, rankable)` entries, never padded
//! 2. Ordering: metrics are non-increasing
//! 3. Stability: equal metrics keep their input order

use proptest::prelude::*;
use stockcast_core::domain::{Forecast, Horizon, SymbolRecord};
use stockcast_core::{top_n, RankingKey};

/// Records with a 1-year prediction drawn from a small set so ties are common.
/// `None` means the record has no prediction for the horizon.
fn records(growths: &[Option<i32>]) -> Vec<SymbolRecord> {
    growths
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let mut r = SymbolRecord::new(format!("S{i:03}"), "", "");
            if let Some(g) = g {
                r.predictions.insert(
                    Horizon::Year,
                    Forecast {
                        predicted_value: 100.0 + *g as f64,
                        percent_increase: *g as f64,
                    },
                );
            }
            r
        })
        .collect()
}

fn arb_growths() -> impl Strategy<Value = Vec<Option<i32>>> {
    prop::collection::vec(prop::option::weighted(0.8, -3..4_i32), 0..40)
}

proptest! {
    #[test]
    fn output_is_bounded_and_unpadded(growths in arb_growths(), n in 0..50_usize) {
        let recs = records(&growths);
        let rankable = growths.iter().filter(|g| g.is_some()).count();
        let ranked = top_n(&recs, RankingKey::predicted(12), n);
        prop_assert_eq!(ranked.len(), n.min(rankable));
    }

    #[test]
    fn metrics_are_non_increasing(growths in arb_growths()) {
        let recs = records(&growths);
        let ranked = top_n(&recs, RankingKey::predicted(12), usize::MAX);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].metric >= pair[1].metric);
        }
    }

    #[test]
    fn ties_keep_input_order(growths in arb_growths()) {
        let recs = records(&growths);
        let ranked = top_n(&recs, RankingKey::predicted(12), usize::MAX);
        // Symbols are numbered in input order, so within a tie they must ascend.
        for pair in ranked.windows(2) {
            if pair[0].metric == pair[1].metric {
                prop_assert!(pair[0].record.symbol < pair[1].record.symbol);
            }
        }
    }
}
