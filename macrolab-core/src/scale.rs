//! Column scalers used ahead of the variance projection.

use serde::{Deserialize, Serialize};

/// Which scaler a composite indicator applies to its member columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Zero mean, unit variance (population variance).
    Standard,
    /// Linear map onto [0, 1].
    MinMax,
}

/// Scale one column. Statistics are computed over the non-missing values
/// only; NaN entries pass through unchanged. A constant column maps to
/// zeros under either scaler.
pub fn scale_column(values: &[f64], kind: ScalerKind) -> Vec<f64> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return values.to_vec();
    }

    match kind {
        ScalerKind::Standard => {
            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            values
                .iter()
                .map(|v| {
                    if v.is_nan() {
                        f64::NAN
                    } else if std > 0.0 {
                        (v - mean) / std
                    } else {
                        0.0
                    }
                })
                .collect()
        }
        ScalerKind::MinMax => {
            let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
            let max = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            values
                .iter()
                .map(|v| {
                    if v.is_nan() {
                        f64::NAN
                    } else if range > 0.0 {
                        (v - min) / range
                    } else {
                        0.0
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_scaling_centers_and_normalizes() {
        let scaled = scale_column(&[1.0, 2.0, 3.0], ScalerKind::Standard);
        let mean: f64 = scaled.iter().sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        let var: f64 = scaled.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn minmax_maps_onto_unit_interval() {
        let scaled = scale_column(&[5.0, 10.0, 7.5], ScalerKind::MinMax);
        assert_eq!(scaled, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn nan_passes_through_and_is_ignored_in_stats() {
        let scaled = scale_column(&[0.0, f64::NAN, 10.0], ScalerKind::MinMax);
        assert_eq!(scaled[0], 0.0);
        assert!(scaled[1].is_nan());
        assert_eq!(scaled[2], 1.0);
    }

    #[test]
    fn constant_column_scales_to_zeros() {
        assert_eq!(scale_column(&[3.0, 3.0], ScalerKind::Standard), vec![0.0, 0.0]);
        assert_eq!(scale_column(&[3.0, 3.0], ScalerKind::MinMax), vec![0.0, 0.0]);
    }
}
