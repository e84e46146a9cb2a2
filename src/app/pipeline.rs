//! Shared fit pipeline.
//!
//! load -> outlier screen -> train/test split -> fit surrogates -> diagnostics
//!
//! The CLI handlers only deal with presentation and exports.

use crate::data::{Dataset, load_database};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::fit::{Diagnostics, SurrogateSet, covariate_matrix, evaluate, fit_surrogates, train_test_split};
use crate::predict::{DesignPrediction, predict_outcomes};

/// All computed outputs of a single `surr fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Dataset,
    pub surrogates: SurrogateSet,
    pub diagnostics: Option<Diagnostics>,
}

impl RunOutput {
    /// Expected-value predictions for every dataset row, in dataset order.
    pub fn dataset_predictions(&self) -> Result<Vec<DesignPrediction>, AppError> {
        predict_outcomes(&self.surrogates, &covariate_matrix(&self.dataset.observations))
    }
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    if config.search.cv_folds < 2 {
        return Err(AppError::usage("CV folds must be >= 2."));
    }

    tracing::info!(path = %config.csv_path.display(), "loading database");
    let dataset = load_database(config)?;
    tracing::info!(
        rows_read = dataset.rows_read,
        rows_used = dataset.rows_used,
        n_impacted = dataset.stats.n_impacted,
        "database loaded"
    );

    let (train, test) = train_test_split(&dataset.observations, config.test_fraction, config.seed)?;
    if train.is_empty() {
        return Err(AppError::data("No training rows remain after the train/test split."));
    }
    tracing::info!(n_train = train.len(), n_test = test.len(), "split dataset");

    let surrogates = fit_surrogates(&train, config.classifier, config.regressor, &config.search)?;
    let diagnostics = evaluate(&surrogates, &test)?;

    Ok(RunOutput {
        dataset,
        surrogates,
        diagnostics,
    })
}
