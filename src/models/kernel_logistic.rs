//! L2-penalized logistic regression on RBF kernel features.
//!
//! Each design is represented by its kernel similarities to the training designs,
//! `φ(x) = [k(x, x_1), …, k(x, x_n)]`, and a logistic model
//! `P(impact | x) = σ(b + φ(x)ᵀ w)` is fit by minimizing
//!
//! ```text
//! Σ logloss_i + |w|² / (2C)
//! ```
//!
//! with damped Newton steps (the intercept is not penalized).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::{rbf, sigmoid, softplus, solve_spd};
use crate::models::{ImpactClassifier, StandardScaler};

const MAX_NEWTON_ITERS: usize = 100;
const MAX_HALVINGS: usize = 30;
const STEP_TOL: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelLogistic {
    pub gamma: f64,
    pub c: f64,
    scaler: StandardScaler,
    train_x: DMatrix<f64>,
    intercept: f64,
    weights: DVector<f64>,
}

impl KernelLogistic {
    pub fn fit(x: &DMatrix<f64>, labels: &[bool], gamma: f64, c: f64) -> Result<Self, AppError> {
        let n = x.nrows();
        if n == 0 || n != labels.len() {
            return Err(AppError::fit("Kernel logistic: empty or mismatched training data."));
        }
        if !(gamma > 0.0 && c > 0.0) {
            return Err(AppError::fit(format!(
                "Kernel logistic: invalid hyperparameters gamma={gamma}, C={c}."
            )));
        }

        let scaler = StandardScaler::fit(x);
        let train_x = scaler.transform(x)?;
        let phi = rbf(&train_x, &train_x, gamma);

        // Design with a leading intercept column.
        let mut a = DMatrix::<f64>::zeros(n, n + 1);
        a.column_mut(0).fill(1.0);
        a.columns_mut(1, n).copy_from(&phi);

        let y = DVector::from_iterator(n, labels.iter().map(|&l| if l { 1.0 } else { 0.0 }));
        let lambda = 1.0 / c;

        let objective = |w: &DVector<f64>| -> f64 {
            let eta = &a * w;
            let loss: f64 = eta
                .iter()
                .zip(y.iter())
                .map(|(e, yi)| softplus(*e) - yi * e)
                .sum();
            let penalty = w.rows(1, n).norm_squared();
            loss + 0.5 * lambda * penalty
        };

        let mut w = DVector::<f64>::zeros(n + 1);
        let mut current = objective(&w);

        for _ in 0..MAX_NEWTON_ITERS {
            let eta = &a * &w;
            let p = eta.map(sigmoid);
            let s = p.map(|pi| (pi * (1.0 - pi)).max(1e-12));

            let mut grad = a.transpose() * (&p - &y);
            for j in 1..=n {
                grad[j] += lambda * w[j];
            }

            let mut weighted = a.clone();
            for (i, mut row) in weighted.row_iter_mut().enumerate() {
                row *= s[i];
            }
            let mut hess = a.transpose() * weighted;
            for j in 1..=n {
                hess[(j, j)] += lambda;
            }

            let Some(step) = solve_spd(&hess, &grad) else {
                return Err(AppError::fit("Kernel logistic: singular Newton system."));
            };

            // Backtrack until the objective decreases.
            let mut t = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                let candidate = &w - &step * t;
                let value = objective(&candidate);
                if value.is_finite() && value <= current {
                    accepted = Some((candidate, value));
                    break;
                }
                t *= 0.5;
            }
            let Some((next, value)) = accepted else {
                break;
            };

            let moved = (&next - &w).amax();
            w = next;
            current = value;
            if moved < STEP_TOL {
                break;
            }
        }

        if !w.iter().all(|v| v.is_finite()) {
            return Err(AppError::fit("Kernel logistic: non-finite coefficients."));
        }

        Ok(Self {
            gamma,
            c,
            scaler,
            train_x,
            intercept: w[0],
            weights: w.rows(1, n).into_owned(),
        })
    }
}

impl ImpactClassifier for KernelLogistic {
    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<[f64; 2]>, AppError> {
        let xs = self.scaler.transform(x)?;
        let phi = rbf(&xs, &self.train_x, self.gamma);
        let eta = (phi * &self.weights).add_scalar(self.intercept);
        Ok(eta
            .iter()
            .map(|e| {
                let p_hit = sigmoid(*e);
                [1.0 - p_hit, p_hit]
            })
            .collect())
    }
}
