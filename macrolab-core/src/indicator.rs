//! Composite indicator construction.
//!
//! A composite indicator compresses a named group of related columns into
//! one representative series: interpolate sparse holes, scale, then project
//! onto the leading principal components and combine them per row. Group
//! membership is declarative configuration, so new groupings are additive —
//! there is no per-category branching here.

use crate::pca::Pca;
use crate::scale::{scale_column, ScalerKind};
use crate::table::TimeSeriesTable;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// How the retained component scores are folded into one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    Mean,
    Sum,
}

/// Declarative definition of one composite indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSpec {
    /// Semantic label; becomes the output column name.
    pub name: String,
    /// Member columns of the group.
    pub columns: Vec<String>,
    pub scaler: ScalerKind,
    pub combine: CombineMethod,
    /// Minimum cumulative explained-variance ratio of the retained
    /// components.
    pub explained_variance: f64,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            scaler: ScalerKind::Standard,
            combine: CombineMethod::Mean,
            explained_variance: 0.8,
        }
    }
}

/// Build one composite indicator over `table`.
///
/// Selects the spec's member columns that exist in the table, interpolates
/// missing values in both directions, scales, and — for groups of two or
/// more columns — projects onto the smallest set of principal components
/// meeting the explained-variance threshold, combined per row. A
/// single-column group is just that column's scaled values.
///
/// Returns None when no member column is present, the covered range is
/// empty, or the projection is degenerate. The projection is refit on every
/// call: indicator values are a function of the current history window.
pub fn build_indicator(table: &TimeSeriesTable, spec: &IndicatorSpec) -> Option<TimeSeriesTable> {
    let member_names: Vec<&str> = spec.columns.iter().map(|s| s.as_str()).collect();
    let group = table.select(&member_names).trim();
    if group.is_empty() || group.width() == 0 {
        return None;
    }

    let filled = group.interpolate_linear_both();
    let scaled_columns: Vec<Vec<f64>> = filled
        .columns()
        .iter()
        .map(|c| scale_column(&c.values, spec.scaler))
        .collect();

    let values = if scaled_columns.len() == 1 {
        scaled_columns.into_iter().next().unwrap()
    } else {
        let rows = filled.height();
        let cols = scaled_columns.len();
        let matrix = DMatrix::from_fn(rows, cols, |i, j| scaled_columns[j][i]);
        let pca = Pca::fit(&matrix)?;
        let retained = pca.components_for_threshold(spec.explained_variance);
        let scores = pca.transform(&matrix);

        (0..rows)
            .map(|i| {
                let total: f64 = (0..retained).map(|k| scores[(i, k)]).sum();
                match spec.combine {
                    CombineMethod::Mean => total / retained as f64,
                    CombineMethod::Sum => total,
                }
            })
            .collect()
    };

    let mut out = TimeSeriesTable::from_parts(filled.dates().to_vec(), Vec::new()).ok()?;
    out.add_column(spec.name.clone(), values).ok()?;
    Some(out)
}
