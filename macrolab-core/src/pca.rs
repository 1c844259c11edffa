//! Principal component analysis over an observation matrix.
//!
//! Fitted fresh on every run over whatever history is currently available;
//! nothing is persisted. Component signs are normalized so that a given
//! input window always produces the same scores.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// A fitted projection: orthonormal components sorted by explained variance.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Column means of the training matrix, subtracted before projection.
    means: DVector<f64>,
    /// One component per column, sorted by descending eigenvalue.
    components: DMatrix<f64>,
    /// Fraction of total variance carried by each component.
    pub explained_variance_ratio: Vec<f64>,
}

impl Pca {
    /// Fit on a rows-by-columns observation matrix.
    ///
    /// Returns None when the matrix is degenerate: fewer than two rows, no
    /// columns, a non-finite entry, or zero total variance.
    pub fn fit(data: &DMatrix<f64>) -> Option<Pca> {
        let (rows, cols) = data.shape();
        if rows < 2 || cols == 0 || data.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let means = DVector::from_iterator(cols, data.column_iter().map(|c| c.mean()));
        let mut centered = data.clone();
        for (j, mean) in means.iter().enumerate() {
            for i in 0..rows {
                centered[(i, j)] -= mean;
            }
        }

        let cov = centered.transpose() * &centered / (rows as f64 - 1.0);
        let eigen = SymmetricEigen::new(cov);

        // Sort components by descending eigenvalue; tiny negative values
        // from rounding are clamped to zero.
        let mut order: Vec<usize> = (0..cols).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let eigenvalues: Vec<f64> = order
            .iter()
            .map(|&i| eigen.eigenvalues[i].max(0.0))
            .collect();
        let total: f64 = eigenvalues.iter().sum();
        if total <= 0.0 {
            return None;
        }

        let mut components = DMatrix::zeros(cols, cols);
        for (new_idx, &old_idx) in order.iter().enumerate() {
            let mut v = eigen.eigenvectors.column(old_idx).clone_owned();
            // Sign convention: the largest-magnitude loading is positive.
            let dominant = v
                .iter()
                .copied()
                .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap())
                .unwrap_or(1.0);
            if dominant < 0.0 {
                v = -v;
            }
            components.set_column(new_idx, &v);
        }

        Some(Pca {
            means,
            components,
            explained_variance_ratio: eigenvalues.iter().map(|e| e / total).collect(),
        })
    }

    /// Project an observation matrix onto the fitted components. Column `k`
    /// of the result holds the scores of component `k`.
    pub fn transform(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let (rows, cols) = data.shape();
        let mut centered = data.clone();
        for (j, mean) in self.means.iter().enumerate().take(cols) {
            for i in 0..rows {
                centered[(i, j)] -= mean;
            }
        }
        centered * &self.components
    }

    /// Smallest number of leading components whose cumulative explained
    /// variance ratio reaches `threshold`.
    pub fn components_for_threshold(&self, threshold: f64) -> usize {
        let mut cumulative = 0.0;
        for (i, ratio) in self.explained_variance_ratio.iter().enumerate() {
            cumulative += ratio;
            if cumulative >= threshold {
                return i + 1;
            }
        }
        self.explained_variance_ratio.len()
    }
}
