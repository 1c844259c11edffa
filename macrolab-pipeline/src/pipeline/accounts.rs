//! Macro/government (quarterly accounts) category pipeline.
//!
//! Driven by the curated significant-features table: per-column lags are
//! loaded, not recomputed. Each (category, table) group is fetched and
//! pivoted per metric; the reference columns are shifted by their curated
//! lags and concatenated per category. One composite indicator is then
//! built per category and lag-tested — at quarterly frequency — against
//! the daily target before the final daily resample.

use super::CategoryOutput;
use crate::config::PipelineConfig;
use crate::reference::{group_by_table, SignificantFeature};
use crate::sources::accounts::{metrics_in, pivot_metric};
use crate::sources::AccountsSource;
use log::{info, warn};
use macrolab_core::granger::best_lag;
use macrolab_core::indicator::{build_indicator, CombineMethod, IndicatorSpec};
use macrolab_core::scale::ScalerKind;
use macrolab_core::table::{Frequency, TimeSeriesTable};
use std::collections::BTreeMap;

/// Run the quarterly accounts pipeline.
pub fn run_accounts(
    source: &dyn AccountsSource,
    reference: &[SignificantFeature],
    target: &TimeSeriesTable,
    cfg: &PipelineConfig,
) -> CategoryOutput {
    // Pre-shift source columns land on a daily scaffold for the audit file.
    let mut audit =
        TimeSeriesTable::scaffold(cfg.scaffold_start, cfg.scaffold_end, Frequency::Daily);
    // Shifted per-category concatenations at native quarterly frequency.
    let mut per_category: BTreeMap<String, TimeSeriesTable> = BTreeMap::new();

    for group in group_by_table(reference) {
        let rows = match source.fetch_table(group.table) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("accounts table {} skipped: {e}", group.table);
                continue;
            }
        };
        let rows: Vec<_> = rows.into_iter().filter(|r| r.date >= cfg.min_date).collect();
        if rows.is_empty() {
            warn!("accounts table {} has no rows after {}", group.table, cfg.min_date);
            continue;
        }
        let available = metrics_in(&rows);

        for metric in group.metrics() {
            if !available.iter().any(|m| m.as_str() == metric) {
                warn!("metric '{metric}' not found in {}", group.table);
                continue;
            }
            let pivoted = pivot_metric(&rows, metric);

            // Keep the curated columns when all of them are present;
            // otherwise fall back to the whole pivot.
            let wanted = group.columns_for(metric);
            let selected = if wanted.iter().all(|c| pivoted.column(c).is_some()) {
                pivoted.select(&wanted)
            } else {
                pivoted.clone()
            };

            // Audit keeps the pre-shift values; the modeling copy applies
            // each column's curated lag at native quarterly frequency.
            let mut shifted = TimeSeriesTable::from_parts(selected.dates().to_vec(), Vec::new())
                .expect("pivoted index is already valid");
            for column in selected.column_names() {
                audit = audit.merge_left(&pivoted.select(&[column]));
                let lag = group.lag_for(column).unwrap_or(0).max(0) as usize;
                shifted = shifted.merge_left(&selected.select(&[column]).shift_forward(lag));
            }

            per_category
                .entry(group.category.to_string())
                .and_modify(|acc| *acc = acc.merge_outer(&shifted))
                .or_insert(shifted);
        }
    }

    // One composite per category, lag-tested at quarterly frequency.
    let mut indices =
        TimeSeriesTable::scaffold(cfg.scaffold_start, cfg.scaffold_end, Frequency::QuarterStart);
    let mut any = false;
    for (category, table) in &per_category {
        let name = cfg.category_name(category);
        let usable = table.drop_sparse_columns(cfg.nan_threshold);
        if usable.width() == 0 {
            warn!("category {name} skipped: all columns too sparse");
            continue;
        }

        let spec = IndicatorSpec {
            name: name.to_string(),
            columns: usable.column_names().iter().map(|s| s.to_string()).collect(),
            scaler: ScalerKind::Standard,
            combine: CombineMethod::Mean,
            explained_variance: cfg.explained_variance,
        };
        let Some(indicator) = build_indicator(&usable, &spec) else {
            warn!("category {name} skipped: projection degenerate");
            continue;
        };

        match best_lag(&indicator, target, &cfg.target_column, &cfg.granger) {
            Some(lag) => {
                info!("category '{name}' leads {} by {lag}q", cfg.target_symbol);
                indices = indices.merge_left(&indicator.shift_forward(lag));
                any = true;
            }
            None => info!("category '{name}' shows no significant lead; omitted"),
        }
    }

    let indicators = if any {
        // Daily resample strictly after lag selection and shifting.
        indices.trim().resample_daily()
    } else {
        TimeSeriesTable::empty()
    };

    CategoryOutput {
        indicators,
        raw: audit.trim(),
    }
}
