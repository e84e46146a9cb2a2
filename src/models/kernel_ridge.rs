//! RBF kernel ridge regression.
//!
//! Solves `(K + λI) α = y - ȳ` on standardized covariates and predicts
//! `ȳ + K(x*, X) α`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::{rbf, solve_spd};
use crate::models::{Regressor, StandardScaler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelRidge {
    pub gamma: f64,
    pub alpha: f64,
    scaler: StandardScaler,
    train_x: DMatrix<f64>,
    dual_coef: DVector<f64>,
    y_mean: f64,
}

impl KernelRidge {
    pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>, gamma: f64, alpha: f64) -> Result<Self, AppError> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(AppError::fit("Kernel ridge: empty or mismatched training data."));
        }
        if !(gamma > 0.0 && alpha > 0.0) {
            return Err(AppError::fit(format!(
                "Kernel ridge: invalid hyperparameters gamma={gamma}, alpha={alpha}."
            )));
        }

        let scaler = StandardScaler::fit(x);
        let train_x = scaler.transform(x)?;
        let y_mean = y.mean();
        let yc = y.map(|v| v - y_mean);

        let mut k = rbf(&train_x, &train_x, gamma);
        for i in 0..k.nrows() {
            k[(i, i)] += alpha;
        }
        let dual_coef = solve_spd(&k, &yc)
            .ok_or_else(|| AppError::fit("Kernel ridge: kernel system is not solvable."))?;

        Ok(Self {
            gamma,
            alpha,
            scaler,
            train_x,
            dual_coef,
            y_mean,
        })
    }
}

impl Regressor for KernelRidge {
    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, AppError> {
        let xs = self.scaler.transform(x)?;
        let k = rbf(&xs, &self.train_x, self.gamma);
        Ok((k * &self.dual_coef).add_scalar(self.y_mean))
    }
}
