//! MacroLab Pipeline — adapters, category pipelines, assembly, persistence.
//!
//! The orchestration layer around `macrolab-core`:
//! - Source adapters for market prices, on-chain charts, observation
//!   series, quarterly accounts, ETF flows and generated holiday calendars
//! - The three category pipelines (on-chain, quarterly accounts,
//!   observation series)
//! - The assembly pipeline with freshness/single-flight handling
//! - CSV persistence of the feature table and audit subsets
//! - The append-only JSONL run log and the significant-features reference

pub mod config;
pub mod persist;
pub mod pipeline;
pub mod rebuild;
pub mod reference;
pub mod runlog;
pub mod sources;

pub use config::{ConfigError, PipelineConfig};
pub use persist::{read_table_csv, write_table_csv, PersistError};
pub use pipeline::CategoryOutput;
pub use rebuild::{rebuild, rebuild_if_needed, RebuildOutcome, RebuildStatus, Sources};
pub use reference::{group_by_table, load_reference, SignificantFeature};
pub use runlog::{RunLog, RunRecord};
pub use sources::SourceError;
