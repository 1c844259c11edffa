//! Observation-series adapter — macro and financial statistics by id.
//!
//! One request per series id against an observations endpoint
//! (`{observations: [{date, value}]}`). Values arrive as strings; the
//! provider marks gaps with "." which — like any unparseable number —
//! becomes a missing observation rather than an error. Series that fail
//! individually are logged and skipped; the batch fails only when nothing
//! was fetched.

use super::{ObservationSource, SourceError};
use chrono::NaiveDate;
use log::warn;
use macrolab_core::table::{Frequency, TimeSeriesTable};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ObservationsPayload {
    observations: Option<Vec<Observation>>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

/// HTTP observation source keyed by an API key.
pub struct ObservationClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    throttle: Duration,
}

impl ObservationClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.stlouisfed.org/fred/series/observations")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            throttle: Duration::from_millis(500),
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    fn frequency_code(frequency: Frequency) -> &'static str {
        match frequency {
            Frequency::Daily => "d",
            Frequency::MonthStart => "m",
            Frequency::QuarterStart => "q",
        }
    }

    fn fetch_one(
        &self,
        series_id: &str,
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeriesTable, SourceError> {
        let url = format!(
            "{}?series_id={series_id}&api_key={}&file_type=json&frequency={}\
             &observation_start={start}&observation_end={end}",
            self.base_url,
            self.api_key,
            Self::frequency_code(frequency),
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "HTTP {} for {series_id}",
                resp.status()
            )));
        }

        let payload: ObservationsPayload = resp
            .json()
            .map_err(|e| SourceError::Malformed(format!("payload for {series_id}: {e}")))?;
        parse_observations(series_id, payload)
    }
}

fn parse_observations(
    series_id: &str,
    payload: ObservationsPayload,
) -> Result<TimeSeriesTable, SourceError> {
    let observations = payload
        .observations
        .ok_or_else(|| SourceError::Malformed(format!("no observations array for {series_id}")))?;

    let mut rows = Vec::with_capacity(observations.len());
    for obs in observations {
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
            SourceError::Malformed(format!("bad date '{}' for {series_id}: {e}", obs.date))
        })?;
        let value = obs.value.parse::<f64>().unwrap_or(f64::NAN);
        rows.push((date, value));
    }
    if rows.is_empty() {
        return Err(SourceError::Unavailable(format!("no rows for {series_id}")));
    }

    TimeSeriesTable::from_rows(series_id, rows)
        .map_err(|e| SourceError::Malformed(format!("index for {series_id}: {e}")))
}

impl ObservationSource for ObservationClient {
    fn fetch_series(
        &self,
        series_ids: &[String],
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeriesTable, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::Unavailable("no API key configured".into()));
        }

        let mut joined: Option<TimeSeriesTable> = None;
        for series_id in series_ids {
            match self.fetch_one(series_id, frequency, start, end) {
                Ok(table) => {
                    joined = Some(match joined {
                        Some(acc) => acc.merge_outer(&table),
                        None => table,
                    });
                }
                Err(e) => warn!("skipping series {series_id}: {e}"),
            }
            std::thread::sleep(self.throttle);
        }

        joined.ok_or_else(|| SourceError::Unavailable("no observation series fetched".into()))
    }
}
