//! Gaussian-process regression with an isotropic RBF kernel plus white noise.
//!
//! Targets are normalized to zero mean / unit variance before fitting, so the
//! signal variance is fixed at 1 and only `(length_scale, noise)` are free.
//! The log marginal likelihood of each fit is kept for hyperparameter search.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::{cholesky_jittered, log_det, rbf_scaled};
use crate::models::{Regressor, StandardScaler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpRegressor {
    pub length_scale: f64,
    pub noise: f64,
    pub log_marginal_likelihood: f64,
    scaler: StandardScaler,
    train_x: DMatrix<f64>,
    alpha: DVector<f64>,
    /// Lower Cholesky factor of `K + σₙ² I`.
    chol_l: DMatrix<f64>,
    y_mean: f64,
    y_std: f64,
}

impl GpRegressor {
    pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>, length_scale: f64, noise: f64) -> Result<Self, AppError> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(AppError::fit("GP regression: empty or mismatched training data."));
        }
        if !(length_scale > 0.0 && noise > 0.0) {
            return Err(AppError::fit(format!(
                "GP regression: invalid hyperparameters length_scale={length_scale}, noise={noise}."
            )));
        }

        let scaler = StandardScaler::fit(x);
        let train_x = scaler.transform(x)?;

        let y_mean = y.mean();
        let y_std = {
            let s = (y.map(|v| (v - y_mean) * (v - y_mean)).sum() / n as f64).sqrt();
            if s.is_finite() && s > 0.0 { s } else { 1.0 }
        };
        let yn = y.map(|v| (v - y_mean) / y_std);

        let mut k = rbf_scaled(&train_x, &train_x, length_scale, 1.0);
        for i in 0..n {
            k[(i, i)] += noise;
        }
        let (chol, _) = cholesky_jittered(&k)
            .ok_or_else(|| AppError::fit("GP regression: covariance matrix is not positive definite."))?;
        let alpha = chol.solve(&yn);

        let log_marginal_likelihood =
            -0.5 * yn.dot(&alpha) - 0.5 * log_det(&chol) - 0.5 * n as f64 * (2.0 * PI).ln();
        if !log_marginal_likelihood.is_finite() {
            return Err(AppError::fit("GP regression: non-finite log marginal likelihood."));
        }

        Ok(Self {
            length_scale,
            noise,
            log_marginal_likelihood,
            scaler,
            train_x,
            alpha,
            chol_l: chol.l(),
            y_mean,
            y_std,
        })
    }

    /// Posterior mean and standard deviation of the latent function.
    pub fn predict_with_std(&self, x: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>), AppError> {
        let xs = self.scaler.transform(x)?;
        let ks = rbf_scaled(&xs, &self.train_x, self.length_scale, 1.0);

        let mean = (&ks * &self.alpha).map(|v| v * self.y_std + self.y_mean);

        let v = self
            .chol_l
            .solve_lower_triangular(&ks.transpose())
            .ok_or_else(|| AppError::fit("GP regression: singular Cholesky factor."))?;
        let std = DVector::from_fn(xs.nrows(), |j, _| {
            let var = 1.0 - v.column(j).norm_squared();
            var.max(0.0).sqrt() * self.y_std
        });

        Ok((mean, std))
    }
}

impl Regressor for GpRegressor {
    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, AppError> {
        let xs = self.scaler.transform(x)?;
        let ks = rbf_scaled(&xs, &self.train_x, self.length_scale, 1.0);
        Ok((ks * &self.alpha).map(|v| v * self.y_std + self.y_mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_data(n: usize) -> (DMatrix<f64>, DVector<f64>) {
        let x = DMatrix::from_fn(n, 1, |i, _| i as f64 / (n as f64 - 1.0) * 4.0);
        let y = DVector::from_fn(n, |i, _| 0.2 + 0.1 * x[(i, 0)].sin());
        (x, y)
    }

    #[test]
    fn fits_smooth_function() {
        let (x, y) = sine_data(30);
        let model = GpRegressor::fit(&x, &y, 0.5, 1e-6).unwrap();
        let probe = DMatrix::from_row_slice(1, 1, &[1.3]);
        let pred = model.predict(&probe).unwrap();
        let expected = 0.2 + 0.1 * 1.3_f64.sin();
        assert!((pred[0] - expected).abs() < 1e-3, "got {}", pred[0]);
    }

    #[test]
    fn std_is_small_at_training_points_and_large_far_away() {
        let (x, y) = sine_data(20);
        let model = GpRegressor::fit(&x, &y, 0.5, 1e-6).unwrap();
        let probe = DMatrix::from_row_slice(2, 1, &[x[(5, 0)], 50.0]);
        let (mean, std) = model.predict_with_std(&probe).unwrap();
        assert!(std[0] < std[1]);
        // Far from the data the posterior reverts to the target mean.
        assert!((mean[1] - y.mean()).abs() < 1e-6);
    }

    #[test]
    fn likelihood_prefers_reasonable_noise() {
        let (x, y) = sine_data(30);
        let good = GpRegressor::fit(&x, &y, 0.5, 1e-4).unwrap();
        let bad = GpRegressor::fit(&x, &y, 0.5, 10.0).unwrap();
        assert!(good.log_marginal_likelihood > bad.log_marginal_likelihood);
    }
}
