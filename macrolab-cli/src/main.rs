//! MacroLab CLI — feature-table rebuild and inspection commands.
//!
//! Commands:
//! - `rebuild` — run the full assembly pipeline (freshness-aware)
//! - `status` — report output freshness and the last run record
//! - `log` — print recent run records
//!
//! Provider API keys come from the environment (`FRED_API_KEY`,
//! `BEA_API_KEY`); an absent key degrades that domain to "unavailable"
//! rather than failing the run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use macrolab_core::freshness::is_fresh;
use macrolab_core::singleflight::RebuildGuard;
use macrolab_pipeline::config::PipelineConfig;
use macrolab_pipeline::rebuild::{rebuild_if_needed, RebuildStatus, Sources};
use macrolab_pipeline::reference::{load_reference, SignificantFeature};
use macrolab_pipeline::runlog::RunLog;
use macrolab_pipeline::sources::accounts::AccountsClient;
use macrolab_pipeline::sources::etf::HttpFlowSource;
use macrolab_pipeline::sources::market::HttpPriceSource;
use macrolab_pipeline::sources::observations::ObservationClient;
use macrolab_pipeline::sources::onchain::ChartMetricSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "macrolab", about = "MacroLab — composite-indicator feature pipeline")]
struct Cli {
    /// Path to a TOML pipeline config. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full assembly pipeline and persist the feature table.
    Rebuild {
        /// Rebuild even if today's output already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Report output freshness and the most recent run.
    Status,
    /// Print recent run-log records.
    Log {
        /// How many records to show.
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Rebuild { force } => run_rebuild(&config, force),
        Commands::Status => run_status(&config),
        Commands::Log { count } => run_log(&config, count),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_reference_or_empty(config: &PipelineConfig) -> Vec<SignificantFeature> {
    match load_reference(&config.reference_path) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(
                "reference table {} unavailable ({e}); quarterly domain will be skipped",
                config.reference_path.display()
            );
            Vec::new()
        }
    }
}

fn run_rebuild(config: &PipelineConfig, force: bool) -> Result<()> {
    let market = HttpPriceSource::new(&config.target_symbol);
    let onchain = ChartMetricSource::new();
    let observations = ObservationClient::new(env_key("FRED_API_KEY"));
    let accounts = AccountsClient::new(env_key("BEA_API_KEY"));
    let flows = HttpFlowSource::new(&config.etf_url);

    let sources = Sources {
        market: &market,
        onchain: &onchain,
        observations: &observations,
        accounts: &accounts,
        flows: &flows,
    };
    let reference = load_reference_or_empty(config);
    let guard = RebuildGuard::new();

    match rebuild_if_needed(&guard, &sources, &reference, config, force)? {
        RebuildStatus::Completed(outcome) => {
            println!(
                "Rebuilt {}: {} rows x {} columns ({})",
                config.feature_path().display(),
                outcome.feature_rows,
                outcome.feature_columns,
                &outcome.feature_hash[..12],
            );
        }
        RebuildStatus::SkippedFresh => {
            println!("Feature table already reflects today; use --force to rebuild anyway.");
        }
        RebuildStatus::Busy => {
            println!("A rebuild is already in flight; nothing to do.");
        }
    }
    Ok(())
}

fn run_status(config: &PipelineConfig) -> Result<()> {
    let path = config.feature_path();
    if !path.exists() {
        println!("No feature table at {}", path.display());
        return Ok(());
    }
    println!(
        "{}: {}",
        path.display(),
        if is_fresh(&path) { "fresh (today)" } else { "stale" }
    );

    match RunLog::new(config.runlog_path()).last()? {
        Some(record) => {
            println!("Last run {}: {}", record.date, record.status);
            if let Some(rows) = record.feature_rows {
                println!("  rows: {rows}");
            }
            if let Some(hash) = record.feature_hash {
                println!("  hash: {hash}");
            }
        }
        None => println!("No runs recorded yet."),
    }
    Ok(())
}

fn run_log(config: &PipelineConfig, count: usize) -> Result<()> {
    let records = RunLog::new(config.runlog_path()).tail(count)?;
    if records.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    for record in records {
        let rows = record
            .feature_rows
            .map(|r| format!(" ({r} rows)"))
            .unwrap_or_default();
        println!("{}  {}{rows}", record.date, record.status);
    }
    Ok(())
}

fn env_key(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}
