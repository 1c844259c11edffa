//! End-to-end assembly test on synthetic sources.
//!
//! A 100-day target ramp (with small random-walk innovations, so its own
//! past does not predict it perfectly) and one on-chain candidate metric
//! equal to the target shifted back by three days plus noise. The pipeline
//! must recover the three-day lead, shift the composite onto the target's
//! timeline, and persist a feature table anchored on the first priced date.

use chrono::NaiveDate;
use macrolab_core::singleflight::RebuildGuard;
use macrolab_core::table::{Frequency, TimeSeriesTable};
use macrolab_pipeline::config::PipelineConfig;
use macrolab_pipeline::persist::read_table_csv;
use macrolab_pipeline::rebuild::{rebuild_if_needed, RebuildStatus, Sources};
use macrolab_pipeline::runlog::RunLog;
use macrolab_pipeline::sources::{
    AccountRow, AccountsSource, FlowSource, MetricSource, ObservationSource, PriceSource,
    SourceError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const TARGET_DAYS: usize = 100;
const TRUE_LEAD: usize = 3;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn daily_table(name: &str, values: &[f64]) -> TimeSeriesTable {
    let rows = values
        .iter()
        .enumerate()
        .map(|(i, v)| (start() + chrono::Duration::days(i as i64), *v))
        .collect();
    TimeSeriesTable::from_rows(name, rows).unwrap()
}

/// Target levels 1, 2, 3, ... with small random-walk innovations.
fn synthetic_series() -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut base = Vec::with_capacity(TARGET_DAYS + TRUE_LEAD);
    let mut level = 1.0;
    base.push(level);
    for _ in 1..(TARGET_DAYS + TRUE_LEAD) {
        level += 1.0 + rng.gen_range(-1.0..1.0);
        base.push(level);
    }

    let target: Vec<f64> = base[..TARGET_DAYS].to_vec();
    // Candidate at day t carries the target's value from t + 3 days, plus
    // noise small against the target's own innovations so the three-day
    // lead dominates every other lag by orders of magnitude.
    let candidate: Vec<f64> = (0..TARGET_DAYS)
        .map(|t| base[t + TRUE_LEAD] + rng.gen_range(-0.15..0.15))
        .collect();
    (target, candidate)
}

struct FakeMarket(TimeSeriesTable);
impl PriceSource for FakeMarket {
    fn fetch_daily(&self, _s: NaiveDate, _e: NaiveDate) -> Result<TimeSeriesTable, SourceError> {
        Ok(self.0.clone())
    }
}

struct FailingMarket;
impl PriceSource for FailingMarket {
    fn fetch_daily(&self, _s: NaiveDate, _e: NaiveDate) -> Result<TimeSeriesTable, SourceError> {
        Err(SourceError::Unavailable("provider offline".into()))
    }
}

struct FakeMetrics(TimeSeriesTable);
impl MetricSource for FakeMetrics {
    fn fetch_metric(&self, metric: &str) -> Result<TimeSeriesTable, SourceError> {
        if metric == "candidate" {
            Ok(self.0.clone())
        } else {
            Err(SourceError::Unavailable(format!("no fake for {metric}")))
        }
    }
}

struct DeadObservations;
impl ObservationSource for DeadObservations {
    fn fetch_series(
        &self,
        _ids: &[String],
        _f: Frequency,
        _s: NaiveDate,
        _e: NaiveDate,
    ) -> Result<TimeSeriesTable, SourceError> {
        Err(SourceError::Unavailable("observations offline".into()))
    }
}

struct DeadAccounts;
impl AccountsSource for DeadAccounts {
    fn fetch_table(&self, _table_id: &str) -> Result<Vec<AccountRow>, SourceError> {
        Err(SourceError::Unavailable("accounts offline".into()))
    }
}

struct FakeFlows;
impl FlowSource for FakeFlows {
    fn fetch_flows(&self) -> Result<TimeSeriesTable, SourceError> {
        Ok(daily_table("IBIT", &[10.0, -5.0, 7.5]))
    }
}

fn test_config(dir: &std::path::Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.output_dir = dir.to_path_buf();
    cfg.onchain_groups =
        BTreeMap::from([("Candidate Indicator".to_string(), vec!["candidate".to_string()])]);
    cfg
}

/// Correlation of first differences at a given alignment offset.
fn diff_correlation(a: &[f64], b: &[f64], offset: i64) -> f64 {
    let diffs = |v: &[f64]| -> Vec<f64> { v.windows(2).map(|w| w[1] - w[0]).collect() };
    let (da, db) = (diffs(a), diffs(b));
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..da.len() {
        let j = i as i64 + offset;
        if j >= 0 && (j as usize) < db.len() {
            xs.push(da[i]);
            ys.push(db[j as usize]);
        }
    }
    let n = xs.len() as f64;
    let (mx, my) = (
        xs.iter().sum::<f64>() / n,
        ys.iter().sum::<f64>() / n,
    );
    let cov: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let vx: f64 = xs.iter().map(|x| (x - mx) * (x - mx)).sum();
    let vy: f64 = ys.iter().map(|y| (y - my) * (y - my)).sum();
    cov / (vx.sqrt() * vy.sqrt())
}

#[test]
fn recovers_three_day_lead_and_aligns_at_zero_offset() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let (target, candidate) = synthetic_series();

    let market = FakeMarket(daily_table("Close", &target));
    let metrics = FakeMetrics(daily_table("candidate", &candidate));
    let sources = Sources {
        market: &market,
        onchain: &metrics,
        observations: &DeadObservations,
        accounts: &DeadAccounts,
        flows: &FakeFlows,
    };

    let guard = RebuildGuard::new();
    let status = rebuild_if_needed(&guard, &sources, &[], &cfg, false).unwrap();
    let outcome = match status {
        RebuildStatus::Completed(outcome) => outcome,
        other => panic!("expected a completed rebuild, got {other:?}"),
    };
    assert_eq!(outcome.feature_rows, TARGET_DAYS);

    let features = read_table_csv(&cfg.feature_path()).unwrap();

    // Row 0 is the first priced date.
    assert_eq!(features.first_date(), Some(start()));
    assert_eq!(features.height(), TARGET_DAYS);

    // Target, indicator, raw metric, ETF flow and holiday columns all
    // arrived on the one timeline.
    for column in ["Close", "Candidate Indicator", "candidate", "IBIT", "US", "UK"] {
        assert!(features.column(column).is_some(), "missing column {column}");
    }

    // The shifted indicator now moves with the target contemporaneously:
    // the innovation correlation peaks at offset zero, so the recovered
    // lead was exactly the three days baked into the candidate.
    let close = features.column("Close").unwrap();
    let indicator = features.column("Candidate Indicator").unwrap();
    // The first shifted rows are interpolation backfill; scan past them.
    let close = &close[(TRUE_LEAD + 2)..];
    let indicator = &indicator[(TRUE_LEAD + 2)..];
    let at_zero = diff_correlation(indicator, close, 0);
    assert!(at_zero > 0.5, "no contemporaneous alignment: {at_zero}");
    for offset in [-3_i64, -2, -1, 1, 2, 3] {
        let shifted = diff_correlation(indicator, close, offset);
        assert!(
            at_zero > shifted.abs() + 0.2,
            "offset {offset} rivals zero: {shifted} vs {at_zero}"
        );
    }

    // Audit subsets were persisted alongside the feature table.
    for subset in ["btc.csv", "btc-etf.csv", "bea.csv", "fred.csv", "indicators.csv"] {
        assert!(
            cfg.subsets_dir().join(subset).exists(),
            "missing subset {subset}"
        );
    }

    // The run log recorded one successful attempt.
    let records = RunLog::new(cfg.runlog_path()).tail(10).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].succeeded());
    assert_eq!(records[0].feature_rows, Some(TARGET_DAYS));
}

#[test]
fn fresh_output_skips_and_force_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let (target, candidate) = synthetic_series();

    let market = FakeMarket(daily_table("Close", &target));
    let metrics = FakeMetrics(daily_table("candidate", &candidate));
    let sources = Sources {
        market: &market,
        onchain: &metrics,
        observations: &DeadObservations,
        accounts: &DeadAccounts,
        flows: &FakeFlows,
    };
    let guard = RebuildGuard::new();

    assert!(matches!(
        rebuild_if_needed(&guard, &sources, &[], &cfg, false).unwrap(),
        RebuildStatus::Completed(_)
    ));
    // The output written moments ago is fresh for today.
    assert!(matches!(
        rebuild_if_needed(&guard, &sources, &[], &cfg, false).unwrap(),
        RebuildStatus::SkippedFresh
    ));
    // Force bypasses the freshness check.
    assert!(matches!(
        rebuild_if_needed(&guard, &sources, &[], &cfg, true).unwrap(),
        RebuildStatus::Completed(_)
    ));

    // Skipped attempts are not rebuild attempts; the log holds two runs.
    assert_eq!(RunLog::new(cfg.runlog_path()).tail(10).unwrap().len(), 2);
}

#[test]
fn failed_rebuild_keeps_last_good_output_and_logs_the_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let (target, candidate) = synthetic_series();

    let market = FakeMarket(daily_table("Close", &target));
    let metrics = FakeMetrics(daily_table("candidate", &candidate));
    let good = Sources {
        market: &market,
        onchain: &metrics,
        observations: &DeadObservations,
        accounts: &DeadAccounts,
        flows: &FakeFlows,
    };
    let guard = RebuildGuard::new();
    rebuild_if_needed(&guard, &good, &[], &cfg, true).unwrap();
    let before = std::fs::read_to_string(cfg.feature_path()).unwrap();

    let bad = Sources {
        market: &FailingMarket,
        onchain: &metrics,
        observations: &DeadObservations,
        accounts: &DeadAccounts,
        flows: &FakeFlows,
    };
    let err = rebuild_if_needed(&guard, &bad, &[], &cfg, true);
    assert!(err.is_err());

    // Last known-good output is untouched.
    let after = std::fs::read_to_string(cfg.feature_path()).unwrap();
    assert_eq!(before, after);

    // The failure went into the run log verbatim enough to diagnose.
    let records = RunLog::new(cfg.runlog_path()).tail(10).unwrap();
    assert_eq!(records.len(), 2);
    assert!(!records[1].succeeded());
    assert!(records[1].status.contains("offline"));
}
