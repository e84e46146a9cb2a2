//! Linear ridge regression with an unpenalized intercept.
//!
//! The penalty is folded into an augmented least-squares problem
//!
//! ```text
//! [ 1  X      ] [b0]   [y]
//! [ 0  √λ I   ] [β ] ≈ [0]
//! ```
//!
//! which is then handed to the SVD solver.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::solve_least_squares;
use crate::models::{Regressor, StandardScaler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegressor {
    pub alpha: f64,
    pub intercept: f64,
    pub coef: Vec<f64>,
    scaler: StandardScaler,
}

impl RidgeRegressor {
    pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Result<Self, AppError> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(AppError::fit("Ridge: empty or mismatched training data."));
        }
        if !(alpha >= 0.0 && alpha.is_finite()) {
            return Err(AppError::fit(format!("Ridge: invalid penalty alpha={alpha}.")));
        }

        let scaler = StandardScaler::fit(x);
        let xs = scaler.transform(x)?;
        let (n, p) = (xs.nrows(), xs.ncols());

        let mut a = DMatrix::<f64>::zeros(n + p, p + 1);
        let mut b = DVector::<f64>::zeros(n + p);
        for i in 0..n {
            a[(i, 0)] = 1.0;
            for j in 0..p {
                a[(i, j + 1)] = xs[(i, j)];
            }
            b[i] = y[i];
        }
        let penalty = alpha.sqrt();
        for j in 0..p {
            a[(n + j, j + 1)] = penalty;
        }

        let beta = solve_least_squares(&a, &b)
            .ok_or_else(|| AppError::fit("Ridge: least-squares system is ill-conditioned."))?;

        Ok(Self {
            alpha,
            intercept: beta[0],
            coef: beta.iter().skip(1).copied().collect(),
            scaler,
        })
    }
}

impl Regressor for RidgeRegressor {
    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, AppError> {
        let xs = self.scaler.transform(x)?;
        let coef = DVector::from_column_slice(&self.coef);
        Ok((xs * coef).add_scalar(self.intercept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_linear_relation_without_penalty() {
        let x = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 1.0, 0.0, 2.0, 2.0, 3.0, 1.0]);
        let y = DVector::from_fn(4, |i, _| 1.0 + 2.0 * x[(i, 0)] - x[(i, 1)]);
        let model = RidgeRegressor::fit(&x, &y, 0.0).unwrap();
        let pred = model.predict(&x).unwrap();
        for i in 0..4 {
            assert!((pred[i] - y[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn penalty_shrinks_slope_but_not_intercept() {
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[5.0, 6.0, 7.0]);
        let model = RidgeRegressor::fit(&x, &y, 1e8).unwrap();
        assert!(model.coef[0].abs() < 1e-6);
        assert!((model.intercept - 6.0).abs() < 1e-9);
    }
}
