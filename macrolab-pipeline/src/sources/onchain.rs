//! On-chain chart adapter — one metric per request.
//!
//! The charts endpoint serves each statistic (hash rate, transaction
//! counts, address activity) as `{values: [{x: unix_ts, y: value}]}`. The
//! provider rate-limits aggressively, so a fixed delay is inserted after
//! every request; the delay is this adapter's concern, not the pipeline's.

use super::{MetricSource, SourceError};
use macrolab_core::table::TimeSeriesTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartPayload {
    values: Option<Vec<ChartPoint>>,
}

#[derive(Debug, Deserialize)]
struct ChartPoint {
    x: i64,
    y: f64,
}

/// HTTP chart-metric source.
pub struct ChartMetricSource {
    client: reqwest::blocking::Client,
    base_url: String,
    throttle: Duration,
}

impl ChartMetricSource {
    pub fn new() -> Self {
        Self::with_base_url("https://api.blockchain.info/charts")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            throttle: Duration::from_secs(2),
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    fn parse_payload(metric: &str, payload: ChartPayload) -> Result<TimeSeriesTable, SourceError> {
        let points = payload
            .values
            .ok_or_else(|| SourceError::Malformed(format!("no values array for {metric}")))?;

        // Later samples win on repeated dates (intraday points).
        let mut by_date = BTreeMap::new();
        for point in points {
            let date = chrono::DateTime::from_timestamp(point.x, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    SourceError::Malformed(format!("invalid timestamp {} for {metric}", point.x))
                })?;
            by_date.insert(date, point.y);
        }

        if by_date.is_empty() {
            return Err(SourceError::Unavailable(format!("no data for {metric}")));
        }
        TimeSeriesTable::from_rows(metric, by_date.into_iter().collect())
            .map_err(|e| SourceError::Malformed(format!("chart index for {metric}: {e}")))
    }
}

impl Default for ChartMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for ChartMetricSource {
    fn fetch_metric(&self, metric: &str) -> Result<TimeSeriesTable, SourceError> {
        let url = format!(
            "{}/{metric}?timespan=all&format=json&sampled=false",
            self.base_url
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let result = if !resp.status().is_success() {
            Err(SourceError::Unavailable(format!(
                "HTTP {} for {metric}",
                resp.status()
            )))
        } else {
            let payload: ChartPayload = resp
                .json()
                .map_err(|e| SourceError::Malformed(format!("chart payload for {metric}: {e}")))?;
            Self::parse_payload(metric, payload)
        };

        // Back off before the next metric regardless of outcome.
        std::thread::sleep(self.throttle);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_dates_keep_the_latest_sample() {
        let payload = ChartPayload {
            values: Some(vec![
                ChartPoint { x: 1_700_000_000, y: 1.0 },
                ChartPoint { x: 1_700_003_600, y: 2.0 }, // same day, later
                ChartPoint { x: 1_700_086_400, y: 3.0 },
            ]),
        };
        let table = ChartMetricSource::parse_payload("hash-rate", payload).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.column("hash-rate").unwrap()[0], 2.0);
    }

    #[test]
    fn missing_values_array_is_malformed() {
        let err = ChartMetricSource::parse_payload("hash-rate", ChartPayload { values: None })
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn empty_values_array_is_unavailable() {
        let err = ChartMetricSource::parse_payload(
            "hash-rate",
            ChartPayload { values: Some(vec![]) },
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
