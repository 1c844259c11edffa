//! Lead/lag selection via Granger causality.
//!
//! For a single-column candidate series and a target series, finds the lag
//! (in the candidate's native period) with the strongest evidence that the
//! candidate's past improves prediction of the target, using the ssr-based
//! chi-square variant of the test. The winning lag is applied by shifting
//! the candidate *forward* by that many periods: a candidate that leads the
//! target by L lines up with the target L periods later.
//!
//! Lag selection always runs at the candidate's native frequency; callers
//! resample to daily only after shifting. Interpolating first would
//! manufacture autocorrelation and bias the test.

use crate::table::TimeSeriesTable;
use nalgebra::{DMatrix, DVector};
use statrs::function::gamma::gamma_ur;

/// Tuning for the lag search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GrangerConfig {
    /// Largest lag tried, in the candidate's native periods.
    pub max_lag: usize,
    /// A lag is only assigned when its p-value is strictly below this level.
    pub significance: f64,
}

impl Default for GrangerConfig {
    fn default() -> Self {
        Self {
            max_lag: 5,
            significance: 0.05,
        }
    }
}

/// Best lag in `[1, max_lag]` for `candidate` leading `target[target_col]`,
/// or None when no lag shows a significant relationship (or there is too
/// little overlapping data to test: fewer than `max_lag + 1` fully-observed
/// paired rows).
///
/// Ties on the minimal p-value keep the first (smallest) lag.
///
/// Contract: `candidate` must carry exactly one value column and `target`
/// must contain `target_col`. Violations are programmer errors and panic.
pub fn best_lag(
    candidate: &TimeSeriesTable,
    target: &TimeSeriesTable,
    target_col: &str,
    cfg: &GrangerConfig,
) -> Option<usize> {
    let cand_col = candidate
        .single_column()
        .unwrap_or_else(|| {
            panic!(
                "lag selection requires a single-column candidate, got {} columns",
                candidate.width()
            )
        });
    let target_values = target
        .column(target_col)
        .unwrap_or_else(|| panic!("lag selection target is missing column '{target_col}'"));

    // Inner join on exact date equality, keeping only fully-observed pairs.
    let mut x = Vec::new();
    let mut y = Vec::new();
    let (mut i, mut j) = (0, 0);
    let (cd, td) = (candidate.dates(), target.dates());
    while i < cd.len() && j < td.len() {
        if cd[i] < td[j] {
            i += 1;
        } else if cd[i] > td[j] {
            j += 1;
        } else {
            let (cv, tv) = (cand_col.values[i], target_values[j]);
            if cv.is_finite() && tv.is_finite() {
                x.push(cv);
                y.push(tv);
            }
            i += 1;
            j += 1;
        }
    }

    if x.len() < cfg.max_lag + 1 {
        return None;
    }

    let mut best: Option<usize> = None;
    let mut best_p = cfg.significance;
    for lag in 1..=cfg.max_lag {
        if let Some(p) = granger_p_value(&y, &x, lag) {
            if p < best_p {
                best_p = p;
                best = Some(lag);
            }
        }
    }
    best
}

/// P-value of the ssr-based chi-square Granger test at one lag: does adding
/// `x`'s lags to an autoregression of `y` reduce the residual sum of
/// squares more than chance would?
///
/// Returns None when the regression cannot be run at this lag — too few
/// rows for the parameter count, or a singular design.
fn granger_p_value(y: &[f64], x: &[f64], lag: usize) -> Option<f64> {
    let n = y.len();
    let rows = n.checked_sub(lag)?;
    let k_unrestricted = 1 + 2 * lag;
    if rows <= k_unrestricted {
        return None;
    }

    let response = DVector::from_fn(rows, |r, _| y[r + lag]);

    // Restricted: intercept + y's own lags.
    let restricted = DMatrix::from_fn(rows, 1 + lag, |r, c| {
        if c == 0 {
            1.0
        } else {
            y[r + lag - c]
        }
    });
    // Unrestricted: restricted plus x's lags.
    let unrestricted = DMatrix::from_fn(rows, k_unrestricted, |r, c| {
        if c == 0 {
            1.0
        } else if c <= lag {
            y[r + lag - c]
        } else {
            x[r + lag - (c - lag)]
        }
    });

    let ssr_r = ols_ssr(&restricted, &response)?;
    let ssr_u = ols_ssr(&unrestricted, &response)?;
    if !ssr_r.is_finite() || !ssr_u.is_finite() {
        return None;
    }

    // A restricted model that already fits (near-)perfectly leaves nothing
    // for the candidate to explain; the ratio below would be pure rounding
    // noise, so the lag is not testable.
    let scale = response.iter().map(|v| v * v).sum::<f64>().max(1.0);
    if ssr_r <= scale * 1e-12 {
        return None;
    }
    // A (near-)exact unrestricted fit over a non-trivial restricted
    // residual is the strongest possible evidence.
    if ssr_u <= scale * 1e-12 {
        return Some(0.0);
    }

    let statistic = (rows as f64) * (ssr_r - ssr_u).max(0.0) / ssr_u;
    // Upper regularized gamma is the chi-square survival function. Computed
    // directly rather than as 1 - cdf: extreme statistics must keep their
    // tiny tail probabilities distinct so the smallest-lag tie-break only
    // fires on genuine ties.
    Some(gamma_ur(lag as f64 / 2.0, statistic / 2.0))
}

/// Residual sum of squares of an OLS fit via the normal equations.
/// None when the design is singular.
fn ols_ssr(design: &DMatrix<f64>, response: &DVector<f64>) -> Option<f64> {
    let xtx = design.transpose() * design;
    let xty = design.transpose() * response;
    let beta = xtx.try_inverse()? * xty;
    let residuals = response - design * beta;
    Some(residuals.iter().map(|r| r * r).sum())
}
