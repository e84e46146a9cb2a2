//! Command-line parsing for the isolated-building surrogate tool.
//!
//! Argument parsing and command dispatch stay separate from the modeling code:
//! this module only describes flags; `app` maps them onto library calls.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::{ClassifierKind, Covariate, Outcome, RegressorKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "surr",
    version,
    about = "Probability-weighted surrogate models for isolated-building performance"
)]
pub struct Cli {
    /// Log level when `RUST_LOG` is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, env = "SURR_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the impact classifier and conditional regressors, print diagnostics, and optionally export.
    Fit(FitArgs),
    /// Predict expected outcomes with a saved surrogate JSON.
    Predict(PredictArgs),
    /// Write a synthetic simulation database (for demos and smoke tests).
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Simulation database CSV.
    #[arg(long, value_name = "CSV", env = "SURR_CSV")]
    pub csv: PathBuf,

    /// Estimator for P(impact | x).
    #[arg(long, value_enum, default_value_t = ClassifierKind::KernelLogistic)]
    pub classifier: ClassifierKind,

    /// Estimator family for the impact-conditional outcomes.
    #[arg(long, value_enum, default_value_t = RegressorKind::Gpr)]
    pub regressor: RegressorKind,

    /// Fraction of rows held out for diagnostics (0 trains on everything).
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Seed for the train/test split and CV folds.
    #[arg(long, default_value_t = 985)]
    pub seed: u64,

    /// Cross-validation folds for kernel ridge, ridge and kernel logistic.
    #[arg(long, default_value_t = 5)]
    pub cv_folds: usize,

    /// Grid points per hyperparameter axis.
    #[arg(long, default_value_t = 6)]
    pub grid_steps: usize,

    /// Drop rows whose collapse-probability |z-score| reaches this value.
    #[arg(long, default_value_t = 10.0)]
    pub zscore_limit: f64,

    /// Disable the collapse-probability outlier screen.
    #[arg(long)]
    pub no_outlier_filter: bool,

    /// Lognormal dispersion of the collapse fragility (used when only `max_drift` is given).
    #[arg(long, default_value_t = 0.25)]
    pub fragility_beta: f64,

    /// Decimal places in terminal output.
    #[arg(long, default_value_t = 4)]
    pub precision: usize,

    /// Export the fitted surrogates to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    /// Export expected-value predictions for every database row to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_predictions: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    /// Surrogate JSON produced by `surr fit --export-model`.
    #[arg(long, value_name = "JSON", env = "SURR_MODEL")]
    pub model: PathBuf,

    /// CSV of designs to predict (direct or derivable covariate columns).
    #[arg(long, value_name = "CSV", conflicts_with_all = ["x", "y", "space"])]
    pub input: Option<PathBuf>,

    /// Predict over the full 4-D design space.
    #[arg(long, conflicts_with_all = ["x", "y"])]
    pub space: bool,

    /// First varied covariate of a 2-D slice.
    #[arg(long, value_enum, requires = "y")]
    pub x: Option<Covariate>,

    /// Second varied covariate of a 2-D slice.
    #[arg(long, value_enum, requires = "x")]
    pub y: Option<Covariate>,

    /// Lower/upper bound for the slice `x` axis (defaults to the training range).
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub x_bounds: Option<Vec<f64>>,

    /// Lower/upper bound for the slice `y` axis (defaults to the training range).
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub y_bounds: Option<Vec<f64>>,

    /// Hold a covariate at a value, e.g. `--fix T_ratio=3.0` (others use the training median).
    #[arg(long, value_parser = parse_fixed, value_name = "COVARIATE=VALUE")]
    pub fix: Vec<(Covariate, f64)>,

    /// Points per grid axis.
    #[arg(long, default_value_t = 20)]
    pub res: usize,

    /// Print the N designs with the lowest expected outcome.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Outcome used to rank designs.
    #[arg(long, value_enum, default_value_t = Outcome::CostRatio)]
    pub rank_by: Outcome,

    /// Decimal places in terminal output.
    #[arg(long, default_value_t = 4)]
    pub precision: usize,

    /// Write all predictions to CSV.
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Number of designs to generate.
    #[arg(short = 'n', long, default_value_t = 400)]
    pub count: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Std dev of the outcome noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Lognormal dispersion of the collapse fragility.
    #[arg(long, default_value_t = 0.25)]
    pub fragility_beta: f64,

    /// Output CSV.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Parse `COVARIATE=VALUE` for `--fix`.
fn parse_fixed(s: &str) -> Result<(Covariate, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COVARIATE=VALUE, got '{s}'"))?;
    let covariate = Covariate::from_str(name.trim(), true)?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for `{}`: {e}", covariate.column()))?;
    if !value.is_finite() {
        return Err(format!("value for `{}` must be finite", covariate.column()));
    }
    Ok((covariate, value))
}
