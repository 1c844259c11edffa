//! Significant-features reference table.
//!
//! The macro/government domain does not recompute per-column lags: a
//! curated CSV lists which (category, table, metric, column) combinations
//! are significant and the lag each column should be shifted by. This
//! module loads that CSV and groups it the way the quarterly pipeline
//! walks it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One curated reference row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignificantFeature {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Table")]
    pub table: String,
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Column")]
    pub column: String,
    #[serde(rename = "Best Lag")]
    pub best_lag: i64,
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to read reference table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse reference table: {0}")]
    Parse(#[from] csv::Error),
}

/// Load the reference CSV.
pub fn load_reference(path: &Path) -> Result<Vec<SignificantFeature>, ReferenceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Rows for one (category, table) pair, in file order.
#[derive(Debug, Clone)]
pub struct TableGroup<'a> {
    pub category: &'a str,
    pub table: &'a str,
    pub rows: Vec<&'a SignificantFeature>,
}

impl TableGroup<'_> {
    /// Distinct metrics of this group, in file order.
    pub fn metrics(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.metric.as_str()) {
                seen.push(&row.metric);
            }
        }
        seen
    }

    /// Columns listed for one metric.
    pub fn columns_for(&self, metric: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.metric == metric)
            .map(|r| r.column.as_str())
            .collect()
    }

    /// The curated lag for a column, first listing wins.
    pub fn lag_for(&self, column: &str) -> Option<i64> {
        self.rows
            .iter()
            .find(|r| r.column == column)
            .map(|r| r.best_lag)
    }
}

/// Group reference rows by (category, table), preserving first-seen order.
pub fn group_by_table(rows: &[SignificantFeature]) -> Vec<TableGroup<'_>> {
    let mut groups: Vec<TableGroup> = Vec::new();
    for row in rows {
        match groups
            .iter_mut()
            .find(|g| g.category == row.category && g.table == row.table)
        {
            Some(group) => group.rows.push(row),
            None => groups.push(TableGroup {
                category: &row.category,
                table: &row.table,
                rows: vec![row],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Category,Table,Metric,Column,Best Lag
T1,T10101,Level,Gross domestic product,2
T1,T10101,Level,Personal consumption,1
T1,T10105,Index,Gross domestic product,3
T6,T60101,Level,Prices,0
";

    fn write_sample() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "macrolab_reference_{}_{:?}.csv",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_and_groups_by_category_and_table() {
        let path = write_sample();
        let rows = load_reference(&path).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].best_lag, 2);

        let groups = group_by_table(&rows);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].table, "T10101");
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(groups[0].metrics(), vec!["Level"]);
        assert_eq!(
            groups[0].columns_for("Level"),
            vec!["Gross domestic product", "Personal consumption"]
        );
        assert_eq!(groups[0].lag_for("Personal consumption"), Some(1));
        assert_eq!(groups[0].lag_for("missing"), None);

        let _ = std::fs::remove_file(&path);
    }
}
