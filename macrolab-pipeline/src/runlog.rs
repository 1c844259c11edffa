//! Rebuild run log — JSONL append-only persistence.
//!
//! One JSON object per rebuild attempt: the run date, "OK" or the error
//! text, and — for successful runs — the row count and content hash of the
//! persisted feature table. Independent lines keep the format resilient to
//! partial writes and trivially streamable; unreadable lines are skipped
//! on read rather than poisoning the log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// A single rebuild attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub date: NaiveDate,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_hash: Option<String>,
}

impl RunRecord {
    pub fn ok(date: NaiveDate, feature_rows: usize, feature_hash: String) -> Self {
        Self {
            date,
            status: "OK".into(),
            feature_rows: Some(feature_rows),
            feature_hash: Some(feature_hash),
        }
    }

    pub fn failed(date: NaiveDate, error: impl std::fmt::Display) -> Self {
        Self {
            date,
            status: error.to_string(),
            feature_rows: None,
            feature_hash: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == "OK"
    }
}

/// JSONL run-log file manager.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record.
    pub fn append(&self, record: &RunRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// The last `n` records, oldest first. A missing log is simply empty.
    pub fn tail(&self, n: usize) -> io::Result<Vec<RunRecord>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let records: Vec<RunRecord> = io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();
        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }

    /// Most recent record, if any.
    pub fn last(&self) -> io::Result<Option<RunRecord>> {
        Ok(self.tail(1)?.pop())
    }
}
