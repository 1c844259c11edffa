//! CSV persistence for date-indexed tables.
//!
//! Tables cross into and out of Polars here: a `Date` string column plus
//! one float column per series, with empty cells for missing values so the
//! files round-trip NaN cleanly. Writes are atomic — serialize to a
//! buffer, write a `.tmp` sibling, rename into place — so a failing
//! rebuild can never clobber the last good output. The content hash of the
//! written bytes is returned for the run log.

use chrono::NaiveDate;
use macrolab_core::table::{Column, TimeSeriesTable};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    #[error("CSV error for {path}: {message}")]
    Csv { path: String, message: String },

    #[error("schema error for {path}: {message}")]
    Schema { path: String, message: String },
}

impl PersistError {
    fn io(path: &Path, e: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }

    fn csv(path: &Path, e: impl std::fmt::Display) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }

    fn schema(path: &Path, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

/// Write a table as CSV, atomically. Returns the blake3 hex hash of the
/// written bytes.
pub fn write_table_csv(path: &Path, table: &TimeSeriesTable) -> Result<String, PersistError> {
    let mut df = table_to_dataframe(table).map_err(|e| PersistError::csv(path, e))?;

    let mut buffer: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| PersistError::csv(path, e))?;
    let hash = blake3::hash(&buffer).to_hex().to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(path, e))?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    fs::write(&tmp_path, &buffer).map_err(|e| PersistError::io(path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PersistError::io(path, format!("atomic rename failed: {e}"))
    })?;

    Ok(hash)
}

/// Read a table back from CSV.
pub fn read_table_csv(path: &Path) -> Result<TimeSeriesTable, PersistError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| PersistError::io(path, e))?
        .finish()
        .map_err(|e| PersistError::csv(path, e))?;
    dataframe_to_table(path, &df)
}

/// Convert a table to a DataFrame: `Date` strings plus nullable floats.
fn table_to_dataframe(table: &TimeSeriesTable) -> PolarsResult<DataFrame> {
    let dates: Vec<String> = table.dates().iter().map(|d| d.to_string()).collect();
    let mut columns = vec![polars::prelude::Column::new("Date".into(), dates)];
    for col in table.columns() {
        let values: Vec<Option<f64>> = col
            .values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        columns.push(polars::prelude::Column::new(col.name.as_str().into(), values));
    }
    DataFrame::new(columns)
}

/// Convert a read DataFrame back to a table.
fn dataframe_to_table(path: &Path, df: &DataFrame) -> Result<TimeSeriesTable, PersistError> {
    let date_col = df
        .column("Date")
        .map_err(|_| PersistError::schema(path, "missing 'Date' column"))?;
    let date_strs = date_col
        .str()
        .map_err(|e| PersistError::schema(path, format!("'Date' column type: {e}")))?;

    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let raw = date_strs
            .get(i)
            .ok_or_else(|| PersistError::schema(path, format!("null date at row {i}")))?;
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| PersistError::schema(path, format!("bad date '{raw}': {e}")))?;
        dates.push(date);
    }

    let mut columns = Vec::new();
    for series in df.get_columns() {
        if series.name().as_str() == "Date" {
            continue;
        }
        let values = series
            .cast(&DataType::Float64)
            .map_err(|e| PersistError::schema(path, format!("column '{}': {e}", series.name())))?;
        let ca = values
            .f64()
            .map_err(|e| PersistError::schema(path, format!("column '{}': {e}", series.name())))?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        columns.push(Column {
            name: series.name().to_string(),
            values: ca,
        });
    }

    TimeSeriesTable::from_parts(dates, columns)
        .map_err(|e| PersistError::schema(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrolab_core::table::Frequency;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_table() -> TimeSeriesTable {
        let mut t =
            TimeSeriesTable::scaffold(date("2024-01-01"), date("2024-01-04"), Frequency::Daily);
        t.add_column("Close", vec![1.5, f64::NAN, 3.5, 4.0]).unwrap();
        t.add_column("Indicator", vec![f64::NAN, 0.2, 0.3, f64::NAN])
            .unwrap();
        t
    }

    #[test]
    fn csv_roundtrip_preserves_dates_and_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_data.csv");

        let table = sample_table();
        let hash = write_table_csv(&path, &table).unwrap();
        assert_eq!(hash.len(), 64);

        let back = read_table_csv(&path).unwrap();
        assert_eq!(back.dates(), table.dates());
        assert_eq!(back.column_names(), table.column_names());
        let close = back.column("Close").unwrap();
        assert_eq!(close[0], 1.5);
        assert!(close[1].is_nan());
        assert_eq!(close[3], 4.0);
    }

    #[test]
    fn rewrite_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_data.csv");

        write_table_csv(&path, &sample_table()).unwrap();
        let first = fs::read_to_string(&path).unwrap();

        let mut bigger = sample_table();
        bigger.add_column("Extra", vec![9.0; 4]).unwrap();
        write_table_csv(&path, &bigger).unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_ne!(first, second);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn missing_date_column_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            read_table_csv(&path),
            Err(PersistError::Schema { .. })
        ));
    }
}
