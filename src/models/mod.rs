//! Surrogate estimators.
//!
//! Everything downstream of fitting sees estimators only through two small
//! capabilities:
//!
//! - [`Regressor`]: one scalar prediction per covariate row
//! - [`ImpactClassifier`]: `[P(miss), P(hit)]` per covariate row
//!
//! Each estimator owns its input standardization, so callers always pass raw
//! covariates in `Covariate::ALL` column order.

pub mod gpc;
pub mod gpr;
pub mod kernel_logistic;
pub mod kernel_ridge;
pub mod ridge;
pub mod scaler;

pub use gpc::GpClassifier;
pub use gpr::GpRegressor;
pub use kernel_logistic::KernelLogistic;
pub use kernel_ridge::KernelRidge;
pub use ridge::RidgeRegressor;
pub use scaler::StandardScaler;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{ClassifierKind, RegressorKind};
use crate::error::AppError;

/// Continuous-outcome predictor.
pub trait Regressor {
    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, AppError>;
}

/// Probabilistic impact classifier.
pub trait ImpactClassifier {
    /// `[P(no impact), P(impact)]` for every row of `x`.
    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<[f64; 2]>, AppError>;

    /// Hard labels: impact iff `P(impact) >= 0.5`.
    fn predict_label(&self, x: &DMatrix<f64>) -> Result<Vec<bool>, AppError> {
        Ok(self.predict_proba(x)?.iter().map(|p| p[1] >= 0.5).collect())
    }
}

/// A fitted regressor of any supported family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FittedRegressor {
    Gpr(GpRegressor),
    KernelRidge(KernelRidge),
    Ridge(RidgeRegressor),
}

impl FittedRegressor {
    pub fn kind(&self) -> RegressorKind {
        match self {
            FittedRegressor::Gpr(_) => RegressorKind::Gpr,
            FittedRegressor::KernelRidge(_) => RegressorKind::KernelRidge,
            FittedRegressor::Ridge(_) => RegressorKind::Ridge,
        }
    }

    /// Selected hyperparameters, for reports.
    pub fn describe(&self) -> String {
        match self {
            FittedRegressor::Gpr(m) => format!(
                "l={:.3} noise={:.2e} lml={:.2}",
                m.length_scale, m.noise, m.log_marginal_likelihood
            ),
            FittedRegressor::KernelRidge(m) => format!("gamma={:.3} alpha={:.2e}", m.gamma, m.alpha),
            FittedRegressor::Ridge(m) => format!("alpha={:.2e}", m.alpha),
        }
    }
}

impl Regressor for FittedRegressor {
    fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, AppError> {
        match self {
            FittedRegressor::Gpr(m) => m.predict(x),
            FittedRegressor::KernelRidge(m) => m.predict(x),
            FittedRegressor::Ridge(m) => m.predict(x),
        }
    }
}

/// A fitted impact classifier of any supported family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FittedClassifier {
    KernelLogistic(KernelLogistic),
    Gpc(GpClassifier),
}

impl FittedClassifier {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            FittedClassifier::KernelLogistic(_) => ClassifierKind::KernelLogistic,
            FittedClassifier::Gpc(_) => ClassifierKind::Gpc,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FittedClassifier::KernelLogistic(m) => format!("gamma={:.3} C={:.3}", m.gamma, m.c),
            FittedClassifier::Gpc(m) => format!(
                "l={:.3} s2={:.3} lml={:.2}",
                m.length_scale, m.signal_var, m.log_marginal_likelihood
            ),
        }
    }
}

impl ImpactClassifier for FittedClassifier {
    fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<[f64; 2]>, AppError> {
        match self {
            FittedClassifier::KernelLogistic(m) => m.predict_proba(x),
            FittedClassifier::Gpc(m) => m.predict_proba(x),
        }
    }
}
