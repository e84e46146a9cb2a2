//! Surrogate fitting orchestration.
//!
//! Responsibilities:
//!
//! - split data (train / test, hit / miss, CV folds)
//! - generate hyperparameter grids and evaluate candidates (parallel)
//! - fit the classifier and per-outcome conditional regressors
//! - score the result on held-out rows

pub mod diagnostics;
pub mod fitter;
pub mod grid;
pub mod split;

pub use diagnostics::*;
pub use fitter::*;
pub use split::*;
