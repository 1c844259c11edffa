//! Date-indexed, column-oriented tables.
//!
//! `TimeSeriesTable` is the unit of exchange between every pipeline stage:
//! a strictly-ascending, duplicate-free `NaiveDate` index plus zero or more
//! named `f64` columns. A missing observation is NaN — never zero. Calendar
//! gaps in the index are allowed and mean "no row", which is distinct from
//! "a row of NaN".
//!
//! All transformations return a new table; no stage mutates a caller's table.

use chrono::{Datelike, Duration, Months, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Native sampling frequency of a source series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Frequency {
    Daily,
    MonthStart,
    QuarterStart,
}

impl Frequency {
    /// The next period-start date after `date`.
    fn step(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date + Duration::days(1),
            Frequency::MonthStart => date + Months::new(1),
            Frequency::QuarterStart => date + Months::new(3),
        }
    }

    /// Snap a date back to the start of its period.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::MonthStart => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()
            }
            Frequency::QuarterStart => {
                let month = 1 + 3 * ((date.month() - 1) / 3);
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap()
            }
        }
    }
}

/// A single named value column. `values.len()` always equals the table height.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Structured errors for table construction and row/column access.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate date in index: {0}")]
    DuplicateDate(NaiveDate),

    #[error("date index is not strictly ascending at {0}")]
    UnsortedIndex(NaiveDate),

    #[error("column '{name}' has {got} values for {expected} dates")]
    LengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
}

/// Date-indexed table of f64 columns; NaN marks a missing observation.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl TimeSeriesTable {
    /// An empty table: no dates, no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A date scaffold with no value columns, spanning `[start, end]` at the
    /// given frequency. Start is snapped back to its period start.
    pub fn scaffold(start: NaiveDate, end: NaiveDate, freq: Frequency) -> Self {
        let mut dates = Vec::new();
        let mut d = freq.period_start(start);
        while d <= end {
            dates.push(d);
            d = freq.step(d);
        }
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    /// Build a single-column table from (date, value) observations.
    ///
    /// Rows are sorted by date; a duplicate date is an error.
    pub fn from_rows(
        name: impl Into<String>,
        mut rows: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, TableError> {
        rows.sort_by_key(|(d, _)| *d);
        for pair in rows.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(TableError::DuplicateDate(pair[0].0));
            }
        }
        let dates: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
        let values: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();
        Ok(Self {
            dates,
            columns: vec![Column {
                name: name.into(),
                values,
            }],
        })
    }

    /// Build a table from a prepared index and columns, validating the
    /// index invariant and column lengths.
    pub fn from_parts(dates: Vec<NaiveDate>, columns: Vec<Column>) -> Result<Self, TableError> {
        for pair in dates.windows(2) {
            if pair[0] == pair[1] {
                return Err(TableError::DuplicateDate(pair[0]));
            }
            if pair[0] > pair[1] {
                return Err(TableError::UnsortedIndex(pair[1]));
            }
        }
        for col in &columns {
            if col.values.len() != dates.len() {
                return Err(TableError::LengthMismatch {
                    name: col.name.clone(),
                    got: col.values.len(),
                    expected: dates.len(),
                });
            }
        }
        Ok(Self { dates, columns })
    }

    pub fn height(&self) -> usize {
        self.dates.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// The sole column of a single-column table, if there is exactly one.
    pub fn single_column(&self) -> Option<&Column> {
        match self.columns.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Append a column. Errors on a length mismatch or a duplicate name.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if values.len() != self.dates.len() {
            return Err(TableError::LengthMismatch {
                name,
                got: values.len(),
                expected: self.dates.len(),
            });
        }
        if self.column(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Project onto the named columns, ignoring names that do not exist.
    pub fn select(&self, names: &[&str]) -> Self {
        let columns = names
            .iter()
            .filter_map(|n| self.columns.iter().find(|c| c.name == *n).cloned())
            .collect();
        Self {
            dates: self.dates.clone(),
            columns,
        }
    }

    // ── Merging ─────────────────────────────────────────────────────────

    /// Left merge: keep this table's index, align `other`'s columns onto it
    /// by exact date equality (absent dates become NaN). Columns whose name
    /// already exists here are dropped from the incoming table — first one
    /// wins, matching the dedup rule applied after multi-table concats.
    pub fn merge_left(&self, other: &TimeSeriesTable) -> Self {
        let mut out = self.clone();
        let index: HashMap<NaiveDate, usize> = other
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();
        for col in &other.columns {
            if out.column(&col.name).is_some() {
                continue;
            }
            let values: Vec<f64> = out
                .dates
                .iter()
                .map(|d| index.get(d).map(|&i| col.values[i]).unwrap_or(f64::NAN))
                .collect();
            out.columns.push(Column {
                name: col.name.clone(),
                values,
            });
        }
        out
    }

    /// Inner merge: intersection of the two indexes, columns of both sides.
    pub fn merge_inner(&self, other: &TimeSeriesTable) -> Self {
        let other_dates: BTreeSet<NaiveDate> = other.dates.iter().copied().collect();
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| other_dates.contains(d))
            .map(|(i, _)| i)
            .collect();
        let dates: Vec<NaiveDate> = keep.iter().map(|&i| self.dates[i]).collect();
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: keep.iter().map(|&i| c.values[i]).collect(),
            })
            .collect();

        let index: HashMap<NaiveDate, usize> = other
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();
        for col in &other.columns {
            if columns.iter().any(|c| c.name == col.name) {
                continue;
            }
            columns.push(Column {
                name: col.name.clone(),
                values: dates.iter().map(|d| col.values[index[d]]).collect(),
            });
        }
        Self { dates, columns }
    }

    /// Outer merge: union of the two indexes, columns of both sides, NaN
    /// where a side has no row for a date.
    pub fn merge_outer(&self, other: &TimeSeriesTable) -> Self {
        let mut all: BTreeSet<NaiveDate> = self.dates.iter().copied().collect();
        all.extend(other.dates.iter().copied());
        let dates: Vec<NaiveDate> = all.into_iter().collect();

        let mut columns = Vec::new();
        for (source, cols) in [(self, &self.columns), (other, &other.columns)] {
            let index: HashMap<NaiveDate, usize> = source
                .dates
                .iter()
                .enumerate()
                .map(|(i, d)| (*d, i))
                .collect();
            for col in cols.iter() {
                if columns.iter().any(|c: &Column| c.name == col.name) {
                    continue;
                }
                columns.push(Column {
                    name: col.name.clone(),
                    values: dates
                        .iter()
                        .map(|d| index.get(d).map(|&i| col.values[i]).unwrap_or(f64::NAN))
                        .collect(),
                });
            }
        }
        Self { dates, columns }
    }

    // ── Gap/alignment trim ──────────────────────────────────────────────

    /// Trim leading and trailing all-missing rows.
    ///
    /// Returns the contiguous row range from the first row with at least one
    /// non-missing value to the last such row, inclusive. A table with no
    /// non-missing row at all (including one with zero columns) comes back
    /// empty — that is a valid result, not an error.
    pub fn trim(&self) -> Self {
        let has_value =
            |row: usize| self.columns.iter().any(|c| !c.values[row].is_nan());
        let first = (0..self.height()).find(|&r| has_value(r));
        let last = (0..self.height()).rev().find(|&r| has_value(r));
        match (first, last) {
            (Some(a), Some(b)) => self.slice(a, b + 1),
            _ => Self::empty(),
        }
    }

    /// Rows `[start, end)` as a new table.
    fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            dates: self.dates[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[start..end].to_vec(),
                })
                .collect(),
        }
    }

    /// Drop all rows before the first non-missing value of `column`.
    pub fn truncate_to_first_valid(&self, column: &str) -> Result<Self, TableError> {
        let values = self
            .column(column)
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))?;
        match values.iter().position(|v| !v.is_nan()) {
            Some(first) => Ok(self.slice(first, self.height())),
            None => Ok(Self::empty()),
        }
    }

    // ── Shifting ────────────────────────────────────────────────────────

    /// Shift every column forward by `periods` rows: the value observed at
    /// row `i` moves to row `i + periods`, and the first `periods` rows
    /// become missing. Used to apply a selected lead/lag: a candidate that
    /// leads the target by L periods is shifted forward by L.
    pub fn shift_forward(&self, periods: usize) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut values = vec![f64::NAN; self.height()];
                for i in periods..self.height() {
                    values[i] = c.values[i - periods];
                }
                Column {
                    name: c.name.clone(),
                    values,
                }
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            columns,
        }
    }

    // ── Missing-data handling ───────────────────────────────────────────

    /// Fraction of missing values in `column`, or None for an unknown name.
    /// An empty table counts as fully missing.
    pub fn missing_fraction(&self, column: &str) -> Option<f64> {
        let values = self.column(column)?;
        if values.is_empty() {
            return Some(1.0);
        }
        let missing = values.iter().filter(|v| v.is_nan()).count();
        Some(missing as f64 / values.len() as f64)
    }

    /// Dropout rule: drop columns whose missing fraction strictly exceeds
    /// `max_missing`. A column exactly at the threshold is retained.
    pub fn drop_sparse_columns(&self, max_missing: f64) -> Self {
        let columns = self
            .columns
            .iter()
            .filter(|c| {
                self.missing_fraction(&c.name)
                    .map(|f| f <= max_missing)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Self {
            dates: self.dates.clone(),
            columns,
        }
    }

    /// Linear interpolation of interior gaps in every column, with boundary
    /// extension on both ends: rows before the first observation take the
    /// first observed value, rows after the last take the last. Positional,
    /// like interpolation over a regular index; an all-missing column is
    /// left untouched.
    pub fn interpolate_linear_both(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: interpolate_values(&c.values),
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            columns,
        }
    }

    // ── Resampling ──────────────────────────────────────────────────────

    /// Resample onto a daily index spanning the table's own range, filling
    /// by linear interpolation with boundary extension. Native observations
    /// land on their exact dates; interpolation over the daily scaffold is
    /// therefore date-proportional.
    pub fn resample_daily(&self) -> Self {
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return Self::empty();
        };
        TimeSeriesTable::scaffold(first, last, Frequency::Daily)
            .merge_left(self)
            .interpolate_linear_both()
    }

    /// Downsample to month-start frequency, averaging the non-missing
    /// observations within each calendar month. A month with no
    /// observations at all for a column yields NaN.
    pub fn resample_monthly_mean(&self) -> Self {
        let mut months: Vec<NaiveDate> = Vec::new();
        let mut month_rows: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
        for (i, d) in self.dates.iter().enumerate() {
            let m = Frequency::MonthStart.period_start(*d);
            month_rows.entry(m).or_insert_with(|| {
                months.push(m);
                Vec::new()
            });
            month_rows.get_mut(&m).unwrap().push(i);
        }
        months.sort();

        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: months
                    .iter()
                    .map(|m| {
                        let rows = &month_rows[m];
                        let obs: Vec<f64> = rows
                            .iter()
                            .map(|&i| c.values[i])
                            .filter(|v| !v.is_nan())
                            .collect();
                        if obs.is_empty() {
                            f64::NAN
                        } else {
                            obs.iter().sum::<f64>() / obs.len() as f64
                        }
                    })
                    .collect(),
            })
            .collect();
        Self {
            dates: months,
            columns,
        }
    }
}

/// Positional linear interpolation with flat boundary extension.
fn interpolate_values(values: &[f64]) -> Vec<f64> {
    let valid: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    if valid.is_empty() {
        return values.to_vec();
    }

    let mut out = values.to_vec();
    for i in 0..valid[0] {
        out[i] = values[valid[0]];
    }
    for i in valid[valid.len() - 1] + 1..values.len() {
        out[i] = values[valid[valid.len() - 1]];
    }
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a > 1 {
            let span = (b - a) as f64;
            for i in a + 1..b {
                let t = (i - a) as f64 / span;
                out[i] = values[a] + t * (values[b] - values[a]);
            }
        }
    }
    out
}
