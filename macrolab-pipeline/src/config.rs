//! Serializable pipeline configuration.
//!
//! One TOML file drives a rebuild: the calendar scaffold, output layout,
//! the on-chain composite groupings (declarative — new groups are a config
//! edit, not a code change), the observation series batches, and the
//! statistical thresholds. Everything has a default so a missing file or a
//! partial file still yields a runnable pipeline.

use chrono::NaiveDate;
use macrolab_core::granger::GrangerConfig;
use macrolab_core::indicator::{CombineMethod, IndicatorSpec};
use macrolab_core::scale::ScalerKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Calendar scaffold the feature table is assembled on.
    pub scaffold_start: NaiveDate,
    pub scaffold_end: NaiveDate,

    /// Quarterly tables are cut below this date before processing.
    pub min_date: NaiveDate,

    /// Output layout: the feature table lands in `output_dir`, audit
    /// subsets under `output_dir/subsets`.
    pub output_dir: PathBuf,

    /// Target instrument and the column lags are selected against.
    pub target_symbol: String,
    pub target_column: String,

    /// Curated significant-features CSV for the quarterly domain.
    pub reference_path: PathBuf,

    /// Dropout rule: columns with a higher missing fraction are dropped.
    pub nan_threshold: f64,

    /// Cumulative explained-variance threshold for composite indicators.
    pub explained_variance: f64,

    pub granger: GrangerConfig,

    /// On-chain composite groups: indicator name → member metrics.
    pub onchain_groups: BTreeMap<String, Vec<String>>,

    /// Display names for quarterly account categories.
    pub account_categories: BTreeMap<String, String>,

    /// Observation series ids by native frequency.
    pub monthly_series: Vec<String>,
    pub daily_series: Vec<String>,

    /// ETF flow export URL.
    pub etf_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scaffold_start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            scaffold_end: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
            min_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            output_dir: PathBuf::from("data"),
            target_symbol: "BTC-USD".into(),
            target_column: "Close".into(),
            reference_path: PathBuf::from("data/significant_features.csv"),
            nan_threshold: 0.7,
            explained_variance: 0.8,
            granger: GrangerConfig::default(),
            onchain_groups: BTreeMap::from([
                (
                    "Mining Economics".into(),
                    vec![
                        "hash-rate".into(),
                        "miners-revenue".into(),
                        "difficulty".into(),
                    ],
                ),
                (
                    "Transaction Activity".into(),
                    vec![
                        "n-transactions".into(),
                        "estimated-transaction-volume-usd".into(),
                        "mempool-size".into(),
                    ],
                ),
                (
                    "Network Adoption".into(),
                    vec!["n-unique-addresses".into(), "my-wallet-n-users".into()],
                ),
            ]),
            account_categories: BTreeMap::from([
                ("T1".into(), "GDP and National Income".into()),
                ("T2".into(), "Personal Income and Employment".into()),
                ("T3".into(), "Industry Specific Accounts".into()),
                ("T4".into(), "Fixed Assets and Investment".into()),
                ("T5".into(), "Trade and International Transactions".into()),
                ("T6".into(), "Prices and Inflation".into()),
                ("T7".into(), "Government and Public Sector".into()),
                ("T8".into(), "Financial and Corporate Data".into()),
            ]),
            monthly_series: [
                "M2SL",
                "FEDFUNDS",
                "IRLTLT01JPM156N",
                "CPIAUCSL",
                "PAYEMS",
                "GEPUCURRENT",
                "EPUMONETARY",
                "APU000072610",
            ]
            .map(String::from)
            .to_vec(),
            daily_series: [
                "DTWEXBGS",
                "DGS10",
                "DGS2",
                "DFF",
                "VIXCLS",
                "USEPUINDXD",
                "WLEMUINDXD",
                "T10Y2Y",
                "T10Y3M",
                "T10YIE",
            ]
            .map(String::from)
            .to_vec(),
            etf_url: "https://farside.co.uk/bitcoin-etf-flow-all-data/export.csv".into(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file; unspecified fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn feature_path(&self) -> PathBuf {
        self.output_dir.join("daily_data.csv")
    }

    pub fn subsets_dir(&self) -> PathBuf {
        self.output_dir.join("subsets")
    }

    pub fn runlog_path(&self) -> PathBuf {
        self.output_dir.join("runs.jsonl")
    }

    /// The configured on-chain groups as indicator specs.
    pub fn onchain_specs(&self) -> Vec<IndicatorSpec> {
        self.onchain_groups
            .iter()
            .map(|(name, columns)| IndicatorSpec {
                name: name.clone(),
                columns: columns.clone(),
                scaler: ScalerKind::Standard,
                combine: CombineMethod::Mean,
                explained_variance: self.explained_variance,
            })
            .collect()
    }

    /// Every on-chain metric named by some group, deduplicated.
    pub fn onchain_metrics(&self) -> Vec<String> {
        let mut metrics = Vec::new();
        for columns in self.onchain_groups.values() {
            for metric in columns {
                if !metrics.contains(metric) {
                    metrics.push(metric.clone());
                }
            }
        }
        metrics
    }

    /// Display name for a quarterly category key.
    pub fn category_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.account_categories
            .get(key)
            .map(String::as_str)
            .unwrap_or(key)
    }
}
