//! Property tests for series invariants.
//!
//! Uses proptest to verify:
//! 1. Merge ordering — dates strictly ascending, no duplicates, union of inputs
//! 2. Merge precedence — a fetched bar replaces the stored bar on the same date
//! 3. Merge idempotence — merging the same batch again changes nothing
//! 4. Window truncation — each window is the trailing min(len, N) bars
//! 5. Derived fields — nulls exactly where the definitions say
//! 6. Sector table totality — every code maps to exactly one bucket

use barvault_core::classify::sector_for_code;
use barvault_core::domain::{PriceBar, Sector, WindowPolicy};
use barvault_core::series::{enrich, materialize, CanonicalSeries};
use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bar() -> impl Strategy<Value = PriceBar> {
    (0u64..4000, 1.0..500.0_f64, 0u64..5_000_000).prop_map(|(offset, close, volume)| {
        let close = (close * 100.0).round() / 100.0;
        PriceBar {
            date: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap() + Days::new(offset),
            open: close,
            high: close + 1.0,
            low: (close - 0.5).max(0.01),
            close,
            volume,
        }
    })
}

fn arb_bars(max: usize) -> impl Strategy<Value = Vec<PriceBar>> {
    prop::collection::vec(arb_bar(), 0..max)
}

fn arb_window() -> impl Strategy<Value = WindowPolicy> {
    prop::sample::select(WindowPolicy::ALL.to_vec())
}

// ── 1-3. Merge ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_yields_sorted_unique_union(stored in arb_bars(200), fetched in arb_bars(200)) {
        let mut series = CanonicalSeries::from_bars(stored.clone());
        series.merge(fetched.clone());

        let dates: Vec<NaiveDate> = series.bars().iter().map(|b| b.date).collect();
        prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));

        let expected: BTreeSet<NaiveDate> =
            stored.iter().chain(fetched.iter()).map(|b| b.date).collect();
        prop_assert_eq!(dates, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn fetched_bars_win_collisions(stored in arb_bars(200), fetched in arb_bars(200)) {
        let mut series = CanonicalSeries::from_bars(stored);
        series.merge(fetched.clone());

        // Last occurrence within the fetched batch is the one kept
        let latest: BTreeMap<NaiveDate, PriceBar> =
            fetched.into_iter().map(|b| (b.date, b)).collect();
        for bar in series.bars() {
            if let Some(expected) = latest.get(&bar.date) {
                prop_assert_eq!(bar, expected);
            }
        }
    }

    #[test]
    fn merging_twice_is_a_no_op(stored in arb_bars(200), fetched in arb_bars(200)) {
        let mut series = CanonicalSeries::from_bars(stored);
        series.merge(fetched.clone());
        let hash = series.content_hash();
        let before = series.clone();

        let stats = series.merge(fetched);
        prop_assert!(!stats.changed());
        prop_assert_eq!(series.content_hash(), hash);
        prop_assert_eq!(series, before);
    }
}

// ── 4. Windows ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn window_is_trailing_suffix(n in 0usize..3000, policy in arb_window()) {
        let bars: Vec<PriceBar> = (0..n)
            .map(|i| PriceBar {
                date: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap() + Days::new(i as u64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0,
                volume: 1,
            })
            .collect();
        let rows = enrich(&bars);
        let view = materialize(&rows, policy);

        let expected_len = policy.bar_count().map_or(n, |k| k.min(n));
        prop_assert_eq!(view.len(), expected_len);
        prop_assert_eq!(view.bars, &rows[n - expected_len..]);
    }
}

// ── 5. Derived fields ────────────────────────────────────────────────

proptest! {
    #[test]
    fn derived_field_nulls(bars in arb_bars(300)) {
        let series = CanonicalSeries::from_bars(bars);
        let rows = enrich(series.bars());
        prop_assert_eq!(rows.len(), series.len());

        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.daily_return.is_none(), i == 0);
            prop_assert_eq!(row.log_volume.is_none(), row.volume == 0);
            if i > 0 {
                let expected = row.close / rows[i - 1].close - 1.0;
                prop_assert!((row.daily_return.unwrap() - expected).abs() < 1e-12);
            }
        }
    }
}

// ── 6. Sector table ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn sector_table_is_total(code in 0u32..10_000) {
        let sector = sector_for_code(&code.to_string());
        prop_assert!(Sector::ALL.contains(&sector));
    }

    #[test]
    fn non_numeric_codes_are_unclassified(code in "[A-Za-z ./-]{0,8}") {
        prop_assert_eq!(sector_for_code(&code), Sector::Unclassified);
    }
}
