//! Source adapters and the provider traits the pipelines consume.
//!
//! Each adapter owns everything provider-specific — URLs, keys, retries,
//! throttle delays, payload shapes — and hands back a plain
//! `TimeSeriesTable`. The pipelines only see the traits, so tests swap in
//! synthetic implementations.

pub mod accounts;
pub mod etf;
pub mod holidays;
pub mod market;
pub mod observations;
pub mod onchain;

use chrono::NaiveDate;
use macrolab_core::table::{Frequency, TimeSeriesTable};
use thiserror::Error;

/// Structured adapter failures.
///
/// `Unavailable` means the provider could not be reached or returned no
/// data — callers log it and continue with reduced coverage. `Malformed`
/// means the payload arrived but did not have the expected structure —
/// callers catch it per table and skip that table.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Daily OHLCV for the target instrument.
pub trait PriceSource {
    fn fetch_daily(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeriesTable, SourceError>;
}

/// One named chart metric per request (on-chain statistics).
pub trait MetricSource {
    /// Fetch a single metric as a one-column table named after the metric.
    fn fetch_metric(&self, metric: &str) -> Result<TimeSeriesTable, SourceError>;
}

/// Batched observation series by id (macro/financial statistics).
pub trait ObservationSource {
    /// Fetch the given series ids at one frequency, joined on date. Series
    /// that fail individually are skipped; the call fails only when
    /// nothing could be fetched at all.
    fn fetch_series(
        &self,
        series_ids: &[String],
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeriesTable, SourceError>;
}

/// One quarterly accounts record, already parsed: the adapter resolves
/// period strings and numeric formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub metric: String,
    pub column: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Table-keyed quarterly national-accounts data.
pub trait AccountsSource {
    fn fetch_table(&self, table_id: &str) -> Result<Vec<AccountRow>, SourceError>;
}

/// Published daily ETF flow table.
pub trait FlowSource {
    fn fetch_flows(&self) -> Result<TimeSeriesTable, SourceError>;
}
