//! Assembly pipeline — one full feature-table rebuild.
//!
//! Builds the wide daily calendar scaffold, drives the category pipelines
//! in sequence, left-merges everything onto the scaffold, trims, truncates
//! to the first priced date, and persists the feature table plus the
//! per-category audit subsets. A failure anywhere is recorded in the run
//! log and leaves the previously persisted outputs untouched.
//!
//! The freshness check and the single-flight guard are honored here, at
//! the entry point — the rebuild body itself is stateless and re-entrant.

use crate::config::PipelineConfig;
use crate::persist::write_table_csv;
use crate::pipeline::{accounts::run_accounts, observations::run_observations, onchain::run_onchain};
use crate::reference::SignificantFeature;
use crate::runlog::{RunLog, RunRecord};
use crate::sources::holidays::holiday_table;
use crate::sources::{AccountsSource, FlowSource, MetricSource, ObservationSource, PriceSource};
use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};
use macrolab_core::freshness::is_fresh;
use macrolab_core::singleflight::RebuildGuard;
use macrolab_core::table::{Frequency, TimeSeriesTable};

/// Everything a rebuild pulls from the outside world.
pub struct Sources<'a> {
    pub market: &'a dyn PriceSource,
    pub onchain: &'a dyn MetricSource,
    pub observations: &'a dyn ObservationSource,
    pub accounts: &'a dyn AccountsSource,
    pub flows: &'a dyn FlowSource,
}

/// Summary of a completed rebuild.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub feature_rows: usize,
    pub feature_columns: usize,
    pub feature_hash: String,
}

/// What happened to a rebuild request.
#[derive(Debug)]
pub enum RebuildStatus {
    /// The pipeline ran and persisted a new feature table.
    Completed(RebuildOutcome),
    /// Today's output already exists; nothing was done.
    SkippedFresh,
    /// Another rebuild holds the single-flight slot; nothing was done.
    Busy,
}

/// Entry point honoring freshness and the single-flight contract.
///
/// Every executed attempt — success or failure — appends a run record.
pub fn rebuild_if_needed(
    guard: &RebuildGuard,
    sources: &Sources,
    reference: &[SignificantFeature],
    cfg: &PipelineConfig,
    force: bool,
) -> Result<RebuildStatus> {
    if !force && is_fresh(&cfg.feature_path()) {
        info!("feature table is fresh for today; skipping rebuild");
        return Ok(RebuildStatus::SkippedFresh);
    }
    let Some(_permit) = guard.try_acquire() else {
        info!("a rebuild is already in flight; skipping");
        return Ok(RebuildStatus::Busy);
    };

    let runlog = RunLog::new(cfg.runlog_path());
    let today = Local::now().date_naive();
    match rebuild(sources, reference, cfg) {
        Ok(outcome) => {
            runlog
                .append(&RunRecord::ok(
                    today,
                    outcome.feature_rows,
                    outcome.feature_hash.clone(),
                ))
                .context("appending run record")?;
            Ok(RebuildStatus::Completed(outcome))
        }
        Err(e) => {
            // The last good feature table is still on disk; only record
            // what went wrong.
            runlog
                .append(&RunRecord::failed(today, format!("{e:#}")))
                .context("appending failure record")?;
            Err(e)
        }
    }
}

/// Run the full assembly once, unconditionally.
pub fn rebuild(
    sources: &Sources,
    reference: &[SignificantFeature],
    cfg: &PipelineConfig,
) -> Result<RebuildOutcome> {
    let subsets = cfg.subsets_dir();

    let mut main =
        TimeSeriesTable::scaffold(cfg.scaffold_start, cfg.scaffold_end, Frequency::Daily);

    // The target price series is the one non-negotiable input: without it
    // there is nothing to select lags against.
    info!("fetching target prices for {}", cfg.target_symbol);
    let prices = sources
        .market
        .fetch_daily(cfg.scaffold_start, cfg.scaffold_end)
        .with_context(|| format!("fetching target prices for {}", cfg.target_symbol))?;
    main = main.merge_left(&prices);

    info!("running on-chain pipeline");
    let onchain = run_onchain(sources.onchain, &prices, cfg);
    main = main.merge_left(&onchain.indicators);
    main = main.merge_left(&onchain.raw);
    write_table_csv(
        &subsets.join("btc.csv"),
        &prices.merge_left(&onchain.raw).trim(),
    )
    .context("persisting on-chain audit table")?;

    info!("fetching ETF flows");
    match sources.flows.fetch_flows() {
        Ok(flows) => {
            main = main.merge_left(&flows);
            write_table_csv(&subsets.join("btc-etf.csv"), &flows.trim())
                .context("persisting ETF audit table")?;
        }
        Err(e) => warn!("ETF flows unavailable, continuing without them: {e}"),
    }

    info!("running quarterly accounts pipeline");
    let accounts = run_accounts(sources.accounts, reference, &prices, cfg);
    main = main.merge_left(&accounts.indicators);
    write_table_csv(&subsets.join("bea.csv"), &accounts.raw)
        .context("persisting accounts audit table")?;

    write_table_csv(
        &subsets.join("indicators.csv"),
        &onchain.indicators.merge_left(&accounts.indicators).trim(),
    )
    .context("persisting composite indicator table")?;

    info!("running observation series pipeline");
    let observations = run_observations(sources.observations, &prices, cfg);
    main = main.merge_left(&observations.indicators);
    write_table_csv(&subsets.join("fred.csv"), &observations.raw)
        .context("persisting observations audit table")?;

    // Global edge trim, then anchor row 0 on the first priced date.
    main = main.trim();
    main = main
        .truncate_to_first_valid(&cfg.target_column)
        .context("anchoring feature table on the target price")?;

    if let (Some(first), Some(last)) = (main.first_date(), main.last_date()) {
        main = main.merge_left(&holiday_table(first, last));
    }

    let feature_hash =
        write_table_csv(&cfg.feature_path(), &main).context("persisting feature table")?;
    info!(
        "feature table written: {} rows x {} columns",
        main.height(),
        main.width()
    );

    Ok(RebuildOutcome {
        feature_rows: main.height(),
        feature_columns: main.width(),
        feature_hash,
    })
}
