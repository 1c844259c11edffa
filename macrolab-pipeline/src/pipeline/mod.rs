//! Category pipelines — one per data domain.
//!
//! Each pipeline is the same fixed composition: fetch raw tables → pivot
//! where the source is record-shaped → dropout rule → composite indicator
//! per configured group → lead/lag selection against the target at the
//! source's native frequency → shift → daily placement and interpolation.
//! A failing table or category is logged and skipped; partial results are
//! normal with flaky providers.
//!
//! Ordering invariant: lag selection always happens before any daily
//! interpolation. Interpolating a monthly or quarterly series first would
//! hand the causality test manufactured intermediate points.

pub mod accounts;
pub mod observations;
pub mod onchain;

use macrolab_core::table::TimeSeriesTable;

/// What every category pipeline hands back: the lag-shifted modeling
/// series and the untouched raw series kept for audit/inspection.
#[derive(Debug, Default)]
pub struct CategoryOutput {
    /// Daily-resampled, lag-shifted indicator columns for the model.
    pub indicators: TimeSeriesTable,
    /// Pre-shift, pre-projection source data for the chart layer.
    pub raw: TimeSeriesTable,
}

impl CategoryOutput {
    pub fn empty() -> Self {
        Self::default()
    }
}
