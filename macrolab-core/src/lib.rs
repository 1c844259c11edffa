//! MacroLab Core — time-series tables and the indicator-derivation toolkit.
//!
//! This crate holds the pure data-alignment and statistics layer:
//! - Date-indexed tables with NaN-as-missing semantics, merging, trimming,
//!   shifting, interpolation and resampling
//! - Column scalers and per-run PCA
//! - Composite indicator construction from declarative column groups
//! - Granger-based lead/lag selection against a target series
//! - The freshness predicate and the single-flight rebuild guard
//!
//! Source adapters, category pipelines and persistence live in
//! `macrolab-pipeline`; this crate performs no I/O beyond the freshness
//! check and knows nothing about providers.

pub mod freshness;
pub mod granger;
pub mod indicator;
pub mod pca;
pub mod scale;
pub mod singleflight;
pub mod table;

pub use freshness::{is_fresh, is_fresh_on};
pub use granger::{best_lag, GrangerConfig};
pub use indicator::{build_indicator, CombineMethod, IndicatorSpec};
pub use pca::Pca;
pub use scale::{scale_column, ScalerKind};
pub use singleflight::{RebuildGuard, RebuildPermit};
pub use table::{Column, Frequency, TableError, TimeSeriesTable};
