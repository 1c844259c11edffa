//! Central-bank/financial (observation series) category pipeline.
//!
//! Two batches with different native frequencies: monthly series are
//! lag-tested against the monthly-mean resample of the target, daily
//! series against the daily target itself. Each column is shifted by its
//! own selected lag at its native frequency and only then placed on the
//! daily scaffold and interpolated.

use super::CategoryOutput;
use crate::config::PipelineConfig;
use crate::sources::ObservationSource;
use log::{info, warn};
use macrolab_core::granger::best_lag;
use macrolab_core::table::{Frequency, TimeSeriesTable};

/// Run the observation-series pipeline against a fetched daily target.
pub fn run_observations(
    source: &dyn ObservationSource,
    target: &TimeSeriesTable,
    cfg: &PipelineConfig,
) -> CategoryOutput {
    let monthly = match source.fetch_series(
        &cfg.monthly_series,
        Frequency::MonthStart,
        cfg.scaffold_start,
        cfg.scaffold_end,
    ) {
        Ok(table) => table,
        Err(e) => {
            warn!("monthly observations unavailable: {e}");
            TimeSeriesTable::empty()
        }
    };
    let daily = match source.fetch_series(
        &cfg.daily_series,
        Frequency::Daily,
        cfg.scaffold_start,
        cfg.scaffold_end,
    ) {
        Ok(table) => table,
        Err(e) => {
            warn!("daily observations unavailable: {e}");
            TimeSeriesTable::empty()
        }
    };

    if monthly.is_empty() && daily.is_empty() {
        warn!("observation pipeline produced no data at all");
        return CategoryOutput::empty();
    }

    let first = monthly
        .first_date()
        .or(daily.first_date())
        .expect("non-empty side has a first date");
    let mut indices = TimeSeriesTable::scaffold(first, cfg.scaffold_end, Frequency::Daily);

    // Monthly columns test against the target's monthly means; shifting
    // happens at month granularity before daily placement.
    let target_monthly = target
        .select(&[cfg.target_column.as_str()])
        .resample_monthly_mean();
    for column in monthly.column_names() {
        let candidate = monthly.select(&[column]);
        match best_lag(&candidate, &target_monthly, &cfg.target_column, &cfg.granger) {
            Some(lag) => {
                info!("series {column} leads {} by {lag}m", cfg.target_symbol);
                indices = indices.merge_left(&candidate.shift_forward(lag));
            }
            None => info!("series {column} shows no significant monthly lead; omitted"),
        }
    }

    for column in daily.column_names() {
        let candidate = daily.select(&[column]);
        match best_lag(&candidate, target, &cfg.target_column, &cfg.granger) {
            Some(lag) => {
                info!("series {column} leads {} by {lag}d", cfg.target_symbol);
                indices = indices.merge_left(&candidate.shift_forward(lag));
            }
            None => info!("series {column} shows no significant daily lead; omitted"),
        }
    }

    let indicators = if indices.width() > 0 {
        indices.trim().interpolate_linear_both()
    } else {
        TimeSeriesTable::empty()
    };

    CategoryOutput {
        indicators,
        raw: monthly.merge_outer(&daily).trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceError;
    use chrono::NaiveDate;

    /// Fake with one noisy monthly series that leads the target by two
    /// months, and no daily series.
    struct FakeObservations;

    impl ObservationSource for FakeObservations {
        fn fetch_series(
            &self,
            series_ids: &[String],
            frequency: Frequency,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<TimeSeriesTable, SourceError> {
            if frequency != Frequency::MonthStart || series_ids.is_empty() {
                return Err(SourceError::Unavailable("no daily fakes".into()));
            }
            let rows = (0..48)
                .map(|i| (month(i), walk(i + 2)))
                .collect();
            TimeSeriesTable::from_rows("M2SL", rows)
                .map_err(|e| SourceError::Malformed(e.to_string()))
        }
    }

    fn month(i: usize) -> NaiveDate {
        let year = 2020 + (i / 12) as i32;
        NaiveDate::from_ymd_opt(year, 1 + (i % 12) as u32, 1).unwrap()
    }

    /// Deterministic pseudo-random walk shared by candidate and target.
    fn walk(i: usize) -> f64 {
        (0..i).map(|k| ((k * 2654435761) % 1000) as f64 / 500.0 - 1.0).sum()
    }

    #[test]
    fn monthly_series_is_tested_at_monthly_frequency_and_shifted() {
        let mut cfg = PipelineConfig::default();
        cfg.monthly_series = vec!["M2SL".into()];
        cfg.daily_series = vec![];

        // Daily target whose monthly mean equals walk(i) for month i: flat
        // within each month.
        let mut rows = Vec::new();
        for i in 0..48 {
            let m = month(i);
            let next = month(i + 1);
            let mut d = m;
            while d < next {
                rows.push((d, walk(i)));
                d += chrono::Duration::days(1);
            }
        }
        let target = TimeSeriesTable::from_rows("Close", rows).unwrap();

        let out = run_observations(&FakeObservations, &target, &cfg);

        // The candidate column survived, daily-resampled over its span.
        assert!(out.indicators.column("M2SL").is_some());
        assert!(!out.indicators.is_empty());
        // Raw audit keeps the original unshifted monthly values.
        assert!(out.raw.column("M2SL").is_some());
        let raw_first = out.raw.column("M2SL").unwrap()[0];
        assert!((raw_first - walk(2)).abs() < 1e-12);
    }

    #[test]
    fn both_batches_failing_yields_empty_output() {
        struct Dead;
        impl ObservationSource for Dead {
            fn fetch_series(
                &self,
                _ids: &[String],
                _f: Frequency,
                _s: NaiveDate,
                _e: NaiveDate,
            ) -> Result<TimeSeriesTable, SourceError> {
                Err(SourceError::Unavailable("offline".into()))
            }
        }
        let target = TimeSeriesTable::from_rows(
            "Close",
            vec![(month(0), 1.0), (month(1), 2.0)],
        )
        .unwrap();
        let out = run_observations(&Dead, &target, &PipelineConfig::default());
        assert!(out.indicators.is_empty());
        assert!(out.raw.is_empty());
    }
}
