//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - embedded in the exported surrogate JSON
//! - mapped straight onto CLI flags via `clap::ValueEnum`

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Number of design covariates every surrogate is trained on.
pub const N_COVARIATES: usize = 4;

/// Design covariate of an isolated building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Covariate {
    /// Constructed moat clearance over the code displacement demand.
    #[value(name = "gap_ratio")]
    GapRatio,
    /// Superstructure strength reduction factor (`RI`).
    #[value(name = "RI")]
    StrengthRatio,
    /// Isolated period over fixed-base period (`T_M / T_fb`).
    #[value(name = "T_ratio")]
    PeriodRatio,
    /// Effective isolator damping (`zeta_e`).
    #[value(name = "zeta_e")]
    DampingRatio,
}

impl Covariate {
    /// Column order used for every covariate matrix in the crate.
    pub const ALL: [Covariate; N_COVARIATES] = [
        Covariate::GapRatio,
        Covariate::StrengthRatio,
        Covariate::PeriodRatio,
        Covariate::DampingRatio,
    ];

    /// Canonical CSV column name.
    pub fn column(self) -> &'static str {
        match self {
            Covariate::GapRatio => "gap_ratio",
            Covariate::StrengthRatio => "RI",
            Covariate::PeriodRatio => "T_ratio",
            Covariate::DampingRatio => "zeta_e",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Covariate::GapRatio => "gap ratio",
            Covariate::StrengthRatio => "strength ratio",
            Covariate::PeriodRatio => "period ratio",
            Covariate::DampingRatio => "damping ratio",
        }
    }

    /// Position of this covariate in a design row.
    pub fn index(self) -> usize {
        match self {
            Covariate::GapRatio => 0,
            Covariate::StrengthRatio => 1,
            Covariate::PeriodRatio => 2,
            Covariate::DampingRatio => 3,
        }
    }

    /// Bounds of the hard-coded inverse-design search space.
    pub fn design_bounds(self) -> (f64, f64) {
        match self {
            Covariate::GapRatio => (0.6, 1.5),
            Covariate::StrengthRatio => (0.5, 2.25),
            Covariate::PeriodRatio => (2.0, 4.0),
            Covariate::DampingRatio => (0.1, 0.25),
        }
    }
}

/// Continuous decision variable predicted by the surrogates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Median repair cost over replacement cost.
    #[value(name = "cost")]
    CostRatio,
    /// Median sequential repair time over replacement time.
    #[value(name = "time")]
    TimeRatio,
    /// Fraction of realizations requiring replacement.
    #[value(name = "replacement")]
    ReplacementFreq,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::CostRatio, Outcome::TimeRatio, Outcome::ReplacementFreq];

    /// Observed column name in the database CSV.
    pub fn column(self) -> &'static str {
        match self {
            Outcome::CostRatio => "median_cost_ratio",
            Outcome::TimeRatio => "median_time_ratio",
            Outcome::ReplacementFreq => "replacement_freq",
        }
    }

    /// Column name of the probability-weighted prediction.
    pub fn expected_column(self) -> &'static str {
        match self {
            Outcome::CostRatio => "expected_cost_ratio",
            Outcome::TimeRatio => "expected_time_ratio",
            Outcome::ReplacementFreq => "expected_replacement_freq",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Outcome::CostRatio => "repair cost ratio",
            Outcome::TimeRatio => "repair time ratio",
            Outcome::ReplacementFreq => "replacement frequency",
        }
    }
}

/// Which estimator provides `P(impact | x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    /// L2-penalized logistic regression on RBF kernel features.
    KernelLogistic,
    /// Gaussian-process classifier (Laplace approximation).
    Gpc,
}

impl ClassifierKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ClassifierKind::KernelLogistic => "kernel logistic",
            ClassifierKind::Gpc => "GP classifier",
        }
    }
}

/// Which estimator family fits the impact-conditional outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RegressorKind {
    /// Gaussian-process regression (RBF + white noise).
    Gpr,
    /// RBF kernel ridge regression.
    KernelRidge,
    /// Linear ridge regression.
    Ridge,
}

impl RegressorKind {
    pub fn display_name(self) -> &'static str {
        match self {
            RegressorKind::Gpr => "GP regression",
            RegressorKind::KernelRidge => "kernel ridge",
            RegressorKind::Ridge => "ridge",
        }
    }
}

/// One simulated design-run of the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: String,
    /// Covariates in `Covariate::ALL` order.
    pub covariates: [f64; N_COVARIATES],
    /// Whether the isolation layer struck the moat wall.
    pub impacted: bool,
    pub cost_ratio: f64,
    pub time_ratio: f64,
    pub replacement_freq: f64,
    /// Collapse probability, used only for outlier screening.
    pub collapse_prob: Option<f64>,
}

impl Observation {
    pub fn covariate(&self, covariate: Covariate) -> f64 {
        self.covariates[covariate.index()]
    }

    pub fn outcome(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::CostRatio => self.cost_ratio,
            Outcome::TimeRatio => self.time_ratio,
            Outcome::ReplacementFreq => self.replacement_freq,
        }
    }
}

/// Range summary of one covariate over the training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CovariateSummary {
    pub covariate: Covariate,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

/// Summary stats about the rows actually used for fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub n_impacted: usize,
    pub covariates: Vec<CovariateSummary>,
}

impl DatasetStats {
    pub fn summary(&self, covariate: Covariate) -> Option<&CovariateSummary> {
        self.covariates.iter().find(|s| s.covariate == covariate)
    }
}

/// Hyperparameter search settings shared by all estimators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Points per hyperparameter axis.
    pub grid_steps: usize,
    /// Folds for cross-validated estimators.
    pub cv_folds: usize,
    /// Seed for fold assignment.
    pub seed: u64,
}

/// A full fit run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub csv_path: PathBuf,
    pub classifier: ClassifierKind,
    pub regressor: RegressorKind,
    /// Fraction of rows held out for diagnostics (0 trains on everything).
    pub test_fraction: f64,
    pub seed: u64,
    pub search: SearchConfig,
    /// Drop rows whose `collapse_prob` |z| reaches this limit.
    pub zscore_limit: Option<f64>,
    /// Lognormal dispersion used to derive `collapse_prob` from `max_drift`.
    pub fragility_beta: f64,
    pub export_model: Option<PathBuf>,
    pub export_predictions: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covariate_indices_follow_all_order() {
        for (i, c) in Covariate::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn observation_accessors() {
        let obs = Observation {
            id: "r1".to_string(),
            covariates: [1.0, 2.0, 3.0, 0.15],
            impacted: false,
            cost_ratio: 0.1,
            time_ratio: 0.2,
            replacement_freq: 0.3,
            collapse_prob: None,
        };
        assert_eq!(obs.covariate(Covariate::PeriodRatio), 3.0);
        assert_eq!(obs.outcome(Outcome::TimeRatio), 0.2);
        assert_eq!(obs.outcome(Outcome::ReplacementFreq), 0.3);
    }
}
