//! Ordinary least squares.
//!
//! Used for the linear baseline the forest is compared against on the hold-out
//! subset:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! We solve through SVD so tall design matrices (many samples, few features)
//! work, and nearly collinear predictors (e.g. `nir` and `ndvi`) degrade to a
//! minimum-norm solution instead of failing.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// A fitted linear model `y = β0 + Σ βj x_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearFit {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.iter())
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }
}

/// Fit an intercept plus one coefficient per column of `rows`.
pub fn fit_linear(rows: &[Vec<f64>], y: &[f64]) -> Option<LinearFit> {
    let n = rows.len();
    if n == 0 || n != y.len() {
        return None;
    }
    let p = rows[0].len();
    if rows.iter().any(|r| r.len() != p) {
        return None;
    }

    let x = DMatrix::from_fn(n, p + 1, |i, j| if j == 0 { 1.0 } else { rows[i][j - 1] });
    let y = DVector::from_column_slice(y);
    let beta = solve_least_squares(&x, &y)?;

    Some(LinearFit {
        intercept: beta[0],
        coefficients: beta.iter().skip(1).copied().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_linear_recovers_two_predictors() {
        // y = 1 + 2a - b
        let rows: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 1.0 + 2.0 * r[0] - r[1]).collect();

        let fit = fit_linear(&rows, &y).unwrap();
        assert!((fit.intercept - 1.0).abs() < 1e-8);
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-8);
        assert!((fit.coefficients[1] + 1.0).abs() < 1e-8);
        assert!((fit.predict(&[3.0, 4.0]) - 3.0).abs() < 1e-8);
    }
}
