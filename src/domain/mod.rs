//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - design covariates and predicted outcomes (`Covariate`, `Outcome`)
//! - database rows (`Observation`) and their summaries
//! - estimator choices and run configuration (`ClassifierKind`, `FitConfig`, ...)

pub mod types;

pub use types::*;
