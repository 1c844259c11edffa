//! Market price adapter — daily OHLCV for the target instrument.
//!
//! Talks to the v8 chart API (timestamps plus parallel quote arrays),
//! retrying transient failures with exponential backoff. The endpoint has
//! no official contract and changes shape without notice, so every missing
//! piece of structure maps to `SourceError::Malformed`.

use super::{PriceSource, SourceError};
use chrono::NaiveDate;
use macrolab_core::table::{Column, TimeSeriesTable};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// HTTP price source for one symbol.
pub struct HttpPriceSource {
    client: reqwest::blocking::Client,
    base_url: String,
    symbol: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpPriceSource {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_base_url(symbol, "https://query2.finance.yahoo.com/v8/finance/chart")
    }

    pub fn with_base_url(symbol: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            symbol: symbol.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    fn chart_url(&self, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "{}/{}?period1={start_ts}&period2={end_ts}&interval=1d",
            self.base_url, self.symbol
        )
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<TimeSeriesTable, SourceError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                SourceError::Malformed(format!("{}: {}", err.code, err.description))
            } else {
                SourceError::Malformed("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Malformed("result array is empty".into()))?;
        let timestamps = data
            .timestamp
            .ok_or_else(|| SourceError::Malformed("no timestamps".into()))?;
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Malformed("no quote data".into()))?;

        let mut dates = Vec::new();
        let mut rows: Vec<[f64; 5]> = Vec::new();
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| SourceError::Malformed(format!("invalid timestamp: {ts}")))?;

            let close = quote.close.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let open = quote.open.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Fully-observed rows only: partially-quoted bars (and repeated
            // intraday timestamps for the current day) are dropped.
            let (Some(c), Some(h), Some(l), Some(o), Some(v)) =
                (close, high, low, open, volume)
            else {
                continue;
            };
            if dates.last() == Some(&date) {
                continue;
            }
            dates.push(date);
            rows.push([c, h, l, o, v as f64]);
        }

        if dates.is_empty() {
            return Err(SourceError::Unavailable(format!(
                "no quotable rows for {symbol}"
            )));
        }

        let columns = ["Close", "High", "Low", "Open", "Volume"]
            .iter()
            .enumerate()
            .map(|(j, name)| Column {
                name: name.to_string(),
                values: rows.iter().map(|r| r[j]).collect(),
            })
            .collect();
        TimeSeriesTable::from_parts(dates, columns)
            .map_err(|e| SourceError::Malformed(format!("chart index: {e}")))
    }
}

impl PriceSource for HttpPriceSource {
    fn fetch_daily(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeriesTable, SourceError> {
        let url = self.chart_url(start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        last_error = Some(SourceError::Unavailable(format!(
                            "HTTP {status} for {}",
                            self.symbol
                        )));
                        continue;
                    }
                    let chart: ChartResponse = resp.json().map_err(|e| {
                        SourceError::Malformed(format!("chart payload for {}: {e}", self.symbol))
                    })?;
                    return Self::parse_response(&self.symbol, chart);
                }
                Err(e) => {
                    last_error = Some(SourceError::Unavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::Unavailable("max retries exceeded".into())))
    }
}
