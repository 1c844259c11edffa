//! Quarterly national-accounts adapter.
//!
//! The accounts API serves whole tables of {metric, line description, time
//! period, value} records. Periods arrive as `2015Q2`, `2015M03` or plain
//! `2015` and are resolved to period-start dates here; values carry
//! thousands separators. The pivot into per-metric column tables also
//! lives here because it is pure payload reshaping, not pipeline logic.

use super::{AccountRow, AccountsSource, SourceError};
use chrono::NaiveDate;
use macrolab_core::table::TimeSeriesTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AccountsEnvelope {
    #[serde(rename = "BEAAPI")]
    api: ApiBody,
}

#[derive(Debug, Deserialize)]
struct ApiBody {
    #[serde(rename = "Results")]
    results: ResultsBody,
}

#[derive(Debug, Deserialize)]
struct ResultsBody {
    #[serde(rename = "Data")]
    data: Option<Vec<RawRecord>>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "METRIC_NAME", default)]
    metric: String,
    #[serde(rename = "LineDescription")]
    line_description: String,
    #[serde(rename = "TimePeriod")]
    time_period: String,
    #[serde(rename = "DataValue")]
    data_value: String,
}

/// HTTP accounts source keyed by an API key.
pub struct AccountsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    dataset: String,
    throttle: Duration,
}

impl AccountsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://apps.bea.gov/api/data/")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            dataset: "NIPA".into(),
            throttle: Duration::from_secs(5),
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

impl AccountsSource for AccountsClient {
    fn fetch_table(&self, table_id: &str) -> Result<Vec<AccountRow>, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::Unavailable("no API key configured".into()));
        }

        let url = format!(
            "{}?UserID={}&method=GetData&DatasetName={}&TableName={table_id}\
             &Frequency=Q&Year=ALL&ResultFormat=json",
            self.base_url, self.api_key, self.dataset
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "HTTP {} for {table_id}",
                resp.status()
            )));
        }

        let envelope: AccountsEnvelope = resp
            .json()
            .map_err(|e| SourceError::Malformed(format!("payload for {table_id}: {e}")))?;
        let records = envelope
            .api
            .results
            .data
            .ok_or_else(|| SourceError::Malformed(format!("no Data array for {table_id}")))?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Some(date) = parse_period(&record.time_period) else {
                continue;
            };
            let value = record
                .data_value
                .replace(',', "")
                .parse::<f64>()
                .unwrap_or(f64::NAN);
            rows.push(AccountRow {
                metric: record.metric,
                column: record.line_description,
                date,
                value,
            });
        }

        std::thread::sleep(self.throttle);
        if rows.is_empty() {
            return Err(SourceError::Unavailable(format!("no rows for {table_id}")));
        }
        Ok(rows)
    }
}

/// Resolve an accounts time period to its period-start date.
///
/// `2015Q2` → 2015-04-01, `2015M03` → 2015-03-01, `2015` → 2015-01-01;
/// anything else is unusable and yields None.
pub fn parse_period(period: &str) -> Option<NaiveDate> {
    let bytes = period.as_bytes();
    match bytes.len() {
        4 => {
            let year: i32 = period.parse().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
        6 if bytes[4] == b'Q' => {
            let year: i32 = period[..4].parse().ok()?;
            let quarter: u32 = period[5..].parse().ok()?;
            if !(1..=4).contains(&quarter) {
                return None;
            }
            NaiveDate::from_ymd_opt(year, 1 + 3 * (quarter - 1), 1)
        }
        7 if bytes[4] == b'M' => {
            let year: i32 = period[..4].parse().ok()?;
            let month: u32 = period[5..].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)
        }
        _ => None,
    }
}

/// Pivot one metric's records into a table with a column per line
/// description. Repeated (column, date) observations are averaged.
pub fn pivot_metric(rows: &[AccountRow], metric: &str) -> TimeSeriesTable {
    let mut cells: BTreeMap<String, BTreeMap<NaiveDate, (f64, usize)>> = BTreeMap::new();
    let mut dates: BTreeMap<NaiveDate, ()> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.metric == metric) {
        dates.insert(row.date, ());
        let entry = cells
            .entry(row.column.clone())
            .or_default()
            .entry(row.date)
            .or_insert((0.0, 0));
        if !row.value.is_nan() {
            entry.0 += row.value;
            entry.1 += 1;
        }
    }

    let index: Vec<NaiveDate> = dates.into_keys().collect();
    let mut table = TimeSeriesTable::from_parts(index.clone(), Vec::new())
        .expect("BTreeMap keys are sorted and unique");
    for (column, by_date) in cells {
        let values = index
            .iter()
            .map(|d| match by_date.get(d) {
                Some((sum, n)) if *n > 0 => sum / *n as f64,
                _ => f64::NAN,
            })
            .collect();
        // First occurrence of a duplicated description wins.
        let _ = table.add_column(column, values);
    }
    table
}

/// All distinct metrics present in a fetched table, in payload order.
pub fn metrics_in(rows: &[AccountRow]) -> Vec<String> {
    let mut seen = Vec::new();
    for row in rows {
        if !seen.contains(&row.metric) {
            seen.push(row.metric.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn period_formats() {
        assert_eq!(parse_period("2015Q1"), Some(date("2015-01-01")));
        assert_eq!(parse_period("2015Q2"), Some(date("2015-04-01")));
        assert_eq!(parse_period("2015Q4"), Some(date("2015-10-01")));
        assert_eq!(parse_period("2015M03"), Some(date("2015-03-01")));
        assert_eq!(parse_period("2015"), Some(date("2015-01-01")));
        assert_eq!(parse_period("2015Q5"), None);
        assert_eq!(parse_period("15Q1"), None);
        assert_eq!(parse_period("garbage"), None);
    }

    #[test]
    fn pivot_groups_by_description_and_averages_duplicates() {
        let rows = vec![
            AccountRow {
                metric: "Level".into(),
                column: "Gross output".into(),
                date: date("2015-01-01"),
                value: 10.0,
            },
            AccountRow {
                metric: "Level".into(),
                column: "Gross output".into(),
                date: date("2015-01-01"),
                value: 20.0,
            },
            AccountRow {
                metric: "Level".into(),
                column: "Net output".into(),
                date: date("2015-04-01"),
                value: 5.0,
            },
            AccountRow {
                metric: "Index".into(),
                column: "Gross output".into(),
                date: date("2015-01-01"),
                value: 99.0,
            },
        ];

        let pivoted = pivot_metric(&rows, "Level");
        assert_eq!(pivoted.height(), 2);
        assert_eq!(pivoted.column("Gross output").unwrap()[0], 15.0);
        assert!(pivoted.column("Gross output").unwrap()[1].is_nan());
        assert_eq!(pivoted.column("Net output").unwrap()[1], 5.0);

        assert_eq!(metrics_in(&rows), vec!["Level".to_string(), "Index".to_string()]);
    }
}
