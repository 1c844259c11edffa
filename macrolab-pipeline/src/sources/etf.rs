//! ETF flow adapter.
//!
//! The published flow table arrives as delimited text: a date column
//! followed by one column per fund and a trailing total. Outflows are
//! printed in accounting style — `(123.4)` — and blank or dashed cells
//! mean "no flow", which for this table is a true zero rather than a
//! missing observation. The total column is recomputed from the per-fund
//! columns rather than trusted.

use super::{FlowSource, SourceError};
use chrono::NaiveDate;
use macrolab_core::table::{Column, TimeSeriesTable};
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP flow source reading the provider's delimited export.
pub struct HttpFlowSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpFlowSource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            url: url.into(),
        }
    }
}

impl FlowSource for HttpFlowSource {
    fn fetch_flows(&self) -> Result<TimeSeriesTable, SourceError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "HTTP {} for flow table",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        parse_flow_csv(&body)
    }
}

/// Parse the delimited flow export into a date-indexed table.
pub fn parse_flow_csv(body: &str) -> Result<TimeSeriesTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SourceError::Malformed(format!("flow header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.len() < 2 {
        return Err(SourceError::Malformed(
            "flow table needs a date column and at least one fund".into(),
        ));
    }
    let fund_names = &headers[1..headers.len() - 1];
    let total_name = &headers[headers.len() - 1];

    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| SourceError::Malformed(format!("flow row: {e}")))?;
        // Footer/summary rows carry no parseable date; skip them.
        let Some(date) = record.get(0).and_then(parse_flow_date) else {
            continue;
        };
        let values: Vec<f64> = (1..headers.len() - 1)
            .map(|i| record.get(i).map(parse_flow_value).unwrap_or(0.0))
            .collect();
        by_date.insert(date, values);
    }

    if by_date.is_empty() {
        return Err(SourceError::Unavailable("no dated flow rows".into()));
    }

    let dates: Vec<NaiveDate> = by_date.keys().copied().collect();
    let mut columns: Vec<Column> = fund_names
        .iter()
        .enumerate()
        .map(|(j, name)| Column {
            name: name.clone(),
            values: by_date.values().map(|row| row[j]).collect(),
        })
        .collect();
    columns.push(Column {
        name: total_name.clone(),
        values: by_date
            .values()
            .map(|row| row.iter().sum::<f64>())
            .collect(),
    });

    TimeSeriesTable::from_parts(dates, columns)
        .map_err(|e| SourceError::Malformed(format!("flow index: {e}")))
}

/// Dates appear either ISO or in the provider's `13 Jan 2024` style.
fn parse_flow_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(cell, "%d %b %Y"))
        .ok()
}

/// `(123.4)` → -123.4; blanks, dashes and junk → 0.0.
fn parse_flow_value(cell: &str) -> f64 {
    let cell = cell.trim().replace(',', "");
    let (negative, digits) = match cell.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.to_string()),
        None => (false, cell),
    };
    match digits.parse::<f64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) => 0.0,
    }
}
