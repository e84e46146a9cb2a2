//! Per-column standardization fitted on training covariates.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Columns with a spread below this keep unit scale.
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(x.ncols());
        let mut scales = Vec::with_capacity(x.ncols());
        for col in x.column_iter() {
            let m = col.sum() / n;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
            let s = var.sqrt();
            means.push(m);
            scales.push(if s.is_finite() && s > MIN_SCALE { s } else { 1.0 });
        }
        Self { means, scales }
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, AppError> {
        if x.ncols() != self.n_features() {
            return Err(AppError::fit(format!(
                "Model was trained on {} covariate columns, got {}.",
                self.n_features(),
                x.ncols()
            )));
        }
        let mut out = x.clone();
        for (j, mut col) in out.column_iter_mut().enumerate() {
            let (m, s) = (self.means[j], self.scales[j]);
            col.apply(|v| *v = (*v - m) / s);
        }
        Ok(out)
    }
}
