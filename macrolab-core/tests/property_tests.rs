//! Property tests for table invariants.
//!
//! Uses proptest to verify:
//! 1. Trim always exposes a non-missing value on both edge rows
//! 2. Trim is idempotent and never errors, even on all-missing tables
//! 3. The dropout rule's threshold is inclusive
//! 4. Interpolation leaves no missing values when at least one exists

use chrono::NaiveDate;
use macrolab_core::table::{Frequency, TimeSeriesTable};
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// A daily table with one column of optional values.
fn arb_table() -> impl Strategy<Value = TimeSeriesTable> {
    prop::collection::vec(prop::option::of(-1000.0..1000.0_f64), 0..40).prop_map(|cells| {
        let end = base_date() + chrono::Duration::days(cells.len().max(1) as i64 - 1);
        let mut t = TimeSeriesTable::scaffold(base_date(), end, Frequency::Daily);
        if !cells.is_empty() {
            let values: Vec<f64> = cells.iter().map(|c| c.unwrap_or(f64::NAN)).collect();
            t.add_column("x", values).unwrap();
        }
        t
    })
}

proptest! {
    /// After trimming, the first and last rows each hold at least one
    /// non-missing value — or the table is empty.
    #[test]
    fn trim_edges_hold_values(table in arb_table()) {
        let trimmed = table.trim();
        if !trimmed.is_empty() {
            let has_value = |row: usize| {
                trimmed.columns().iter().any(|c| !c.values[row].is_nan())
            };
            prop_assert!(has_value(0));
            prop_assert!(has_value(trimmed.height() - 1));
        }
    }

    /// Trimming an already-trimmed table changes nothing.
    #[test]
    fn trim_is_idempotent(table in arb_table()) {
        let once = table.trim();
        let twice = once.trim();
        prop_assert_eq!(once.height(), twice.height());
        prop_assert_eq!(once.dates(), twice.dates());
    }

    /// Trim never loses observations: every non-missing cell survives.
    #[test]
    fn trim_preserves_observations(table in arb_table()) {
        let observed = |t: &TimeSeriesTable| -> usize {
            t.columns()
                .iter()
                .map(|c| c.values.iter().filter(|v| !v.is_nan()).count())
                .sum()
        };
        prop_assert_eq!(observed(&table), observed(&table.trim()));
    }

    /// A column is kept iff its missing fraction is at most the threshold.
    #[test]
    fn dropout_threshold_boundary(table in arb_table(), threshold in 0.0..1.0_f64) {
        let kept = table.drop_sparse_columns(threshold);
        for col in table.columns() {
            let fraction = table.missing_fraction(&col.name).unwrap();
            let survived = kept.column(&col.name).is_some();
            prop_assert_eq!(survived, fraction <= threshold);
        }
    }

    /// Interpolation in both directions leaves no hole as long as the
    /// column has at least one observation.
    #[test]
    fn interpolation_closes_all_holes(table in arb_table()) {
        let filled = table.interpolate_linear_both();
        for col in table.columns() {
            let had_any = col.values.iter().any(|v| !v.is_nan());
            if had_any {
                let out = filled.column(&col.name).unwrap();
                prop_assert!(out.iter().all(|v| !v.is_nan()));
            }
        }
    }
}
