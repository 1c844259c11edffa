//! Crypto on-chain category pipeline.
//!
//! Fetches the configured chart metrics one by one, drops too-sparse
//! columns, builds one composite indicator per configured group, selects
//! each indicator's lead against the daily target close, shifts, and lays
//! the result onto a daily scaffold.

use super::CategoryOutput;
use crate::config::PipelineConfig;
use crate::sources::MetricSource;
use log::{info, warn};
use macrolab_core::granger::best_lag;
use macrolab_core::indicator::build_indicator;
use macrolab_core::table::{Frequency, TimeSeriesTable};

/// Run the on-chain pipeline against a fetched daily target table.
pub fn run_onchain(
    source: &dyn MetricSource,
    target: &TimeSeriesTable,
    cfg: &PipelineConfig,
) -> CategoryOutput {
    // One fetch per metric; a failing metric costs only its own column.
    let mut raw: Option<TimeSeriesTable> = None;
    for metric in cfg.onchain_metrics() {
        match source.fetch_metric(&metric) {
            Ok(table) => {
                raw = Some(match raw {
                    Some(acc) => acc.merge_outer(&table),
                    None => table,
                });
            }
            Err(e) => warn!("on-chain metric {metric} skipped: {e}"),
        }
    }
    let Some(raw) = raw else {
        warn!("on-chain pipeline produced no data at all");
        return CategoryOutput::empty();
    };

    let usable = raw.drop_sparse_columns(cfg.nan_threshold);

    // One composite per configured group, each lag-tested at daily
    // frequency before any scaffold placement.
    let mut shifted_indicators: Vec<TimeSeriesTable> = Vec::new();
    for spec in cfg.onchain_specs() {
        let Some(indicator) = build_indicator(&usable, &spec) else {
            warn!("indicator '{}' skipped: group too sparse or absent", spec.name);
            continue;
        };
        match best_lag(&indicator, target, &cfg.target_column, &cfg.granger) {
            Some(lag) => {
                info!("indicator '{}' leads {} by {lag}d", spec.name, cfg.target_symbol);
                shifted_indicators.push(indicator.shift_forward(lag));
            }
            None => {
                info!("indicator '{}' shows no significant lead; omitted", spec.name);
            }
        }
    }

    let indicators = match shifted_indicators
        .iter()
        .filter_map(|t| t.first_date())
        .min()
    {
        Some(first) => {
            let mut scaffold =
                TimeSeriesTable::scaffold(first, cfg.scaffold_end, Frequency::Daily);
            for indicator in &shifted_indicators {
                scaffold = scaffold.merge_left(indicator);
            }
            scaffold.trim().interpolate_linear_both()
        }
        None => TimeSeriesTable::empty(),
    };

    CategoryOutput {
        indicators,
        raw: raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MetricSource, SourceError};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct FakeMetrics {
        tables: BTreeMap<String, TimeSeriesTable>,
    }

    impl MetricSource for FakeMetrics {
        fn fetch_metric(&self, metric: &str) -> Result<TimeSeriesTable, SourceError> {
            self.tables
                .get(metric)
                .cloned()
                .ok_or_else(|| SourceError::Unavailable(format!("no fake for {metric}")))
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn series(name: &str, values: Vec<f64>) -> TimeSeriesTable {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| (start() + chrono::Duration::days(i as i64), *v))
            .collect();
        TimeSeriesTable::from_rows(name, rows).unwrap()
    }

    fn test_config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.onchain_groups =
            BTreeMap::from([("Activity".into(), vec!["m1".into(), "m2".into()])]);
        cfg
    }

    #[test]
    fn unavailable_metrics_shrink_but_do_not_abort() {
        let cfg = test_config();
        // m2 is missing entirely; the pipeline continues on m1 alone.
        let n = 60;
        let base: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() * 10.0).collect();
        let tables = BTreeMap::from([("m1".to_string(), series("m1", base.clone()))]);
        let source = FakeMetrics { tables };
        let target = series("Close", base);

        let out = run_onchain(&source, &target, &cfg);
        assert_eq!(out.raw.width(), 1);
        assert!(out.raw.column("m1").is_some());
    }

    #[test]
    fn no_data_yields_empty_output() {
        let cfg = test_config();
        let source = FakeMetrics {
            tables: BTreeMap::new(),
        };
        let target = series("Close", vec![1.0; 10]);
        let out = run_onchain(&source, &target, &cfg);
        assert!(out.indicators.is_empty());
        assert!(out.raw.is_empty());
    }
}
