//! `isolation-surrogate` library crate.
//!
//! The binary (`surr`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the estimators and expected-value predictor are reusable on their own
//!
//! The central operation is [`predict::predict_expected`]: a probability-weighted
//! blend of impact-conditional regressors, `E[y|x] = y_hit·p + y_miss·(1 - p)`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod predict;
pub mod report;
