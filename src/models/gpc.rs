//! Binary Gaussian-process classifier (Laplace approximation).
//!
//! The latent function has an RBF prior `f ~ GP(0, s² k_l)` and a logistic
//! likelihood. The posterior mode is found by Newton iteration in the numerically
//! stable `B = I + W½ K W½` form; predictions average the sigmoid over the
//! Gaussian latent predictive using the probit approximation
//!
//! ```text
//! P(impact | x*) ≈ σ( μ* / sqrt(1 + π v* / 8) )
//! ```

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::{cholesky_jittered, rbf_scaled, sigmoid, softplus};
use crate::models::{ImpactClassifier, StandardScaler};

const MAX_NEWTON_ITERS: usize = 100;
const OBJECTIVE_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpClassifier {
    pub length_scale: f64,
    pub signal_var: f64,
    /// Laplace approximation of the log marginal likelihood.
    pub log_marginal_likelihood: f64,
    scaler: StandardScaler,
    train_x: DMatrix<f64>,
    /// `y - π(f̂)` at the posterior mode.
    residual: DVector<f64>,
    sqrt_w: DVector<f64>,
    /// Lower Cholesky factor of `B` at the posterior mode.
    chol_l: DMatrix<f64>,
}

struct ModeStep {
    a: DVector<f64>,
    f: DVector<f64>,
}

impl GpClassifier {
    pub fn fit(x: &DMatrix<f64>, labels: &[bool], length_scale: f64, signal_var: f64) -> Result<Self, AppError> {
        let n = x.nrows();
        if n == 0 || n != labels.len() {
            return Err(AppError::fit("GP classifier: empty or mismatched training data."));
        }
        if !(length_scale > 0.0 && signal_var > 0.0) {
            return Err(AppError::fit(format!(
                "GP classifier: invalid hyperparameters length_scale={length_scale}, signal_var={signal_var}."
            )));
        }

        let scaler = StandardScaler::fit(x);
        let train_x = scaler.transform(x)?;
        let k = rbf_scaled(&train_x, &train_x, length_scale, signal_var);
        let y = DVector::from_iterator(n, labels.iter().map(|&l| if l { 1.0 } else { 0.0 }));

        let mut f = DVector::<f64>::zeros(n);
        let mut previous = f64::NEG_INFINITY;
        let mut last: Option<ModeStep> = None;

        for _ in 0..MAX_NEWTON_ITERS {
            let step = newton_step(&k, &y, &f)?;
            let objective = -0.5 * step.a.dot(&step.f) + log_likelihood(&y, &step.f);
            f.copy_from(&step.f);
            last = Some(step);
            if !objective.is_finite() {
                return Err(AppError::fit("GP classifier: Newton iteration diverged."));
            }
            if (objective - previous).abs() < OBJECTIVE_TOL {
                break;
            }
            previous = objective;
        }

        let Some(mode) = last else {
            return Err(AppError::fit("GP classifier: no Newton iterations were run."));
        };

        // Re-linearize at the final mode so the stored factors match `f̂`.
        let sqrt_w = sqrt_weights(&mode.f);
        let chol_l = factor_at(&k, &sqrt_w)
            .ok_or_else(|| AppError::fit("GP classifier: B matrix is not positive definite."))?;
        let log_marginal_likelihood = -0.5 * mode.a.dot(&mode.f) + log_likelihood(&y, &mode.f)
            - chol_l.diagonal().iter().map(|v| v.ln()).sum::<f64>();
        if !log_marginal_likelihood.is_finite() {
            return Err(AppError::fit("GP classifier: non-finite log marginal likelihood."));
        }

        Ok(Self {
            length_scale,
            signal_var,
            log_marginal_likelihood,
            scaler,
            train_x,
            residual: &y - mode.f.map(sigmoid),
            sqrt_w,
            chol_l,
        })
    }
}

fn sqrt_weights(f: &DVector<f64>) -> DVector<f64> {
    f.map(|fi| {
        let p = sigmoid(fi);
        (p * (1.0 - p)).sqrt()
    })
}

/// Lower Cholesky factor of `I + W½ K W½`.
fn factor_at(k: &DMatrix<f64>, sqrt_w: &DVector<f64>) -> Option<DMatrix<f64>> {
    let n = k.nrows();
    let mut b = DMatrix::<f64>::identity(n, n);
    for i in 0..n {
        for j in 0..n {
            b[(i, j)] += sqrt_w[i] * k[(i, j)] * sqrt_w[j];
        }
    }
    cholesky_jittered(&b).map(|(chol, _)| chol.l())
}

/// One Newton update of the posterior mode (Rasmussen & Williams, Alg. 3.1).
fn newton_step(k: &DMatrix<f64>, y: &DVector<f64>, f: &DVector<f64>) -> Result<ModeStep, AppError> {
    let pi = f.map(sigmoid);
    let w = pi.map(|p| p * (1.0 - p));
    let sqrt_w = sqrt_weights(f);

    let chol_l = factor_at(k, &sqrt_w)
        .ok_or_else(|| AppError::fit("GP classifier: B matrix is not positive definite."))?;

    let b = w.component_mul(f) + (y - &pi);
    let kb = k * &b;
    let c = chol_l
        .solve_lower_triangular(&sqrt_w.component_mul(&kb))
        .ok_or_else(|| AppError::fit("GP classifier: singular Cholesky factor."))?;
    let back = chol_l
        .transpose()
        .solve_upper_triangular(&c)
        .ok_or_else(|| AppError::fit("GP classifier: singular Cholesky factor."))?;
    let a = b - sqrt_w.component_mul(&back);
    let f_next = k * &a;

    Ok(ModeStep { a, f: f_next })
}

fn log_likelihood(y: &DVector<f64>, f: &DVector<f64>) -> f64 {
    y.iter().zip(f.iter()).map(|(yi, fi)| yi * fi - softplus(*fi)).sum()
}

impl ImpactClassifier for GpClassifier {
    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<[f64; 2]>, AppError> {
        let xs = self.scaler.transform(x)?;
        let ks = rbf_scaled(&xs, &self.train_x, self.length_scale, self.signal_var);
        let mean = &ks * &self.residual;

        let mut rhs = ks.transpose();
        for (i, mut row) in rhs.row_iter_mut().enumerate() {
            row *= self.sqrt_w[i];
        }
        let v = self
            .chol_l
            .solve_lower_triangular(&rhs)
            .ok_or_else(|| AppError::fit("GP classifier: singular Cholesky factor."))?;

        Ok((0..xs.nrows())
            .map(|j| {
                let var = (self.signal_var - v.column(j).norm_squared()).max(0.0);
                let kappa = 1.0 / (1.0 + PI * var / 8.0).sqrt();
                let p_hit = sigmoid(kappa * mean[j]);
                [1.0 - p_hit, p_hit]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_data() -> (DMatrix<f64>, Vec<bool>) {
        let n = 40;
        let x = DMatrix::from_fn(n, 1, |i, _| 0.3 + 1.5 * i as f64 / (n as f64 - 1.0));
        let labels = (0..n).map(|i| x[(i, 0)] < 1.0).collect();
        (x, labels)
    }

    #[test]
    fn learns_threshold() {
        let (x, labels) = threshold_data();
        let model = GpClassifier::fit(&x, &labels, 0.5, 10.0).unwrap();
        let probe = DMatrix::from_row_slice(3, 1, &[0.35, 1.0, 1.75]);
        let proba = model.predict_proba(&probe).unwrap();
        assert!(proba[0][1] > 0.7, "{:?}", proba[0]);
        assert!(proba[2][1] < 0.3, "{:?}", proba[2]);
        assert!(proba[1][1] > proba[2][1] && proba[1][1] < proba[0][1]);
    }

    #[test]
    fn far_from_data_reverts_to_even_odds() {
        let (x, labels) = threshold_data();
        let model = GpClassifier::fit(&x, &labels, 0.5, 10.0).unwrap();
        let proba = model.predict_proba(&DMatrix::from_row_slice(1, 1, &[100.0])).unwrap();
        assert!((proba[0][1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn marginal_likelihood_is_finite_and_negative() {
        let (x, labels) = threshold_data();
        let model = GpClassifier::fit(&x, &labels, 1.0, 1.0).unwrap();
        assert!(model.log_marginal_likelihood.is_finite());
        assert!(model.log_marginal_likelihood < 0.0);
    }
}
