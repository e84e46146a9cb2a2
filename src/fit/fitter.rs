//! Estimator calibration and surrogate-set assembly.
//!
//! Given a training table, we:
//!
//! - fit one impact classifier on the whole population
//! - split the rows into hit / miss partitions
//! - fit a hit and a miss regressor per outcome, each on its own partition
//!
//! Each estimator's two hyperparameters are chosen on a log grid. The GP models
//! are scored by (approximate) log marginal likelihood, the others by k-fold
//! cross-validated loss. Candidates are evaluated in parallel; the best score wins
//! and ties go to the lower grid index so results are deterministic.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{ClassifierKind, Covariate, Observation, Outcome, RegressorKind, SearchConfig};
use crate::error::AppError;
use crate::fit::grid::{self, grid_1d, grid_2d};
use crate::fit::split::{complement, covariate_matrix, impact_labels, kfold_indices, outcome_vector, partition_by_impact};
use crate::math::softplus;
use crate::models::{
    FittedClassifier, FittedRegressor, GpClassifier, GpRegressor, ImpactClassifier, KernelLogistic, KernelRidge,
    Regressor, RidgeRegressor,
};

/// Minimum rows in each impact partition.
pub const MIN_PARTITION_ROWS: usize = 5;

/// Conditional regressors for one outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeModels {
    pub outcome: Outcome,
    /// Fit on impacted rows only.
    pub hit: FittedRegressor,
    /// Fit on non-impacted rows only.
    pub miss: FittedRegressor,
}

/// Everything needed for expected-value prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateSet {
    /// Column order the models expect.
    pub covariates: Vec<Covariate>,
    pub classifier: FittedClassifier,
    pub outcomes: Vec<OutcomeModels>,
    pub n_hit: usize,
    pub n_miss: usize,
}

impl SurrogateSet {
    pub fn outcome(&self, outcome: Outcome) -> Option<&OutcomeModels> {
        self.outcomes.iter().find(|m| m.outcome == outcome)
    }
}

/// Fit the classifier and all conditional regressors.
pub fn fit_surrogates(
    train: &[Observation],
    classifier: ClassifierKind,
    regressor: RegressorKind,
    search: &SearchConfig,
) -> Result<SurrogateSet, AppError> {
    let (hit, miss) = partition_by_impact(train);
    if hit.is_empty() || miss.is_empty() {
        return Err(AppError::fit(format!(
            "Training data must contain both impacted and non-impacted designs (hit={}, miss={}).",
            hit.len(),
            miss.len()
        )));
    }
    for (name, part) in [("impacted", &hit), ("non-impacted", &miss)] {
        if part.len() < MIN_PARTITION_ROWS {
            return Err(AppError::fit(format!(
                "Too few {name} designs to fit conditional models: n={} < {MIN_PARTITION_ROWS}.",
                part.len()
            )));
        }
    }

    let x = covariate_matrix(train);
    let labels = impact_labels(train);
    tracing::info!(
        n = train.len(),
        kind = classifier.display_name(),
        "fitting impact classifier"
    );
    let fitted_classifier = fit_classifier(classifier, &x, &labels, search)?;

    let x_hit = covariate_matrix(&hit);
    let x_miss = covariate_matrix(&miss);
    let mut outcomes = Vec::with_capacity(Outcome::ALL.len());
    for outcome in Outcome::ALL {
        tracing::info!(
            outcome = outcome.column(),
            n_hit = hit.len(),
            n_miss = miss.len(),
            kind = regressor.display_name(),
            "fitting conditional regressors"
        );
        let hit_model = fit_regressor(regressor, &x_hit, &outcome_vector(&hit, outcome), search)?;
        let miss_model = fit_regressor(regressor, &x_miss, &outcome_vector(&miss, outcome), search)?;
        outcomes.push(OutcomeModels {
            outcome,
            hit: hit_model,
            miss: miss_model,
        });
    }

    Ok(SurrogateSet {
        covariates: Covariate::ALL.to_vec(),
        classifier: fitted_classifier,
        outcomes,
        n_hit: hit.len(),
        n_miss: miss.len(),
    })
}

/// Fit a regressor, choosing its hyperparameters on the grid.
pub fn fit_regressor(
    kind: RegressorKind,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    search: &SearchConfig,
) -> Result<FittedRegressor, AppError> {
    if x.nrows() < 2 {
        return Err(AppError::data("Need at least two rows to fit a regressor."));
    }
    match kind {
        RegressorKind::Gpr => {
            let candidates = grid_2d(grid::GPR_LENGTH_SCALE, grid::GPR_NOISE, search.grid_steps)?;
            let (_, model) = best_candidate(&candidates, |l, noise| {
                let m = GpRegressor::fit(x, y, l, noise).ok()?;
                Some((m.log_marginal_likelihood, m))
            })
            .ok_or_else(|| AppError::fit("GP regression: no valid hyperparameter candidate."))?;
            tracing::debug!(l = model.length_scale, noise = model.noise, "selected GP regressor");
            Ok(FittedRegressor::Gpr(model))
        }
        RegressorKind::KernelRidge => {
            let candidates = grid_2d(grid::KERNEL_RIDGE_GAMMA, grid::KERNEL_RIDGE_ALPHA, search.grid_steps)?;
            let ((gamma, alpha), _) = best_candidate(&candidates, |gamma, alpha| {
                let mse = cv_mse(x, y, search, |xt, yt| KernelRidge::fit(xt, yt, gamma, alpha))?;
                Some((-mse, (gamma, alpha)))
            })
            .ok_or_else(|| AppError::fit("Kernel ridge: no valid hyperparameter candidate."))?;
            tracing::debug!(gamma, alpha, "selected kernel ridge");
            Ok(FittedRegressor::KernelRidge(KernelRidge::fit(x, y, gamma, alpha)?))
        }
        RegressorKind::Ridge => {
            let candidates = grid_1d(grid::RIDGE_ALPHA, search.grid_steps)?;
            let (_, alpha) = best_candidate(&candidates, |alpha, _| {
                let mse = cv_mse(x, y, search, |xt, yt| RidgeRegressor::fit(xt, yt, alpha))?;
                Some((-mse, alpha))
            })
            .ok_or_else(|| AppError::fit("Ridge: no valid hyperparameter candidate."))?;
            tracing::debug!(alpha, "selected ridge");
            Ok(FittedRegressor::Ridge(RidgeRegressor::fit(x, y, alpha)?))
        }
    }
}

/// Fit an impact classifier, choosing its hyperparameters on the grid.
pub fn fit_classifier(
    kind: ClassifierKind,
    x: &DMatrix<f64>,
    labels: &[bool],
    search: &SearchConfig,
) -> Result<FittedClassifier, AppError> {
    let n_hit = labels.iter().filter(|&&l| l).count();
    if n_hit == 0 || n_hit == labels.len() {
        return Err(AppError::fit("Impact classifier needs both classes in the training data."));
    }
    match kind {
        ClassifierKind::KernelLogistic => {
            let candidates = grid_2d(grid::LOGISTIC_GAMMA, grid::LOGISTIC_C, search.grid_steps)?;
            let ((gamma, c), _) = best_candidate(&candidates, |gamma, c| {
                let loss = cv_log_loss(x, labels, search, gamma, c)?;
                Some((-loss, (gamma, c)))
            })
            .ok_or_else(|| AppError::fit("Kernel logistic: no valid hyperparameter candidate."))?;
            tracing::debug!(gamma, c, "selected kernel logistic");
            Ok(FittedClassifier::KernelLogistic(KernelLogistic::fit(x, labels, gamma, c)?))
        }
        ClassifierKind::Gpc => {
            let candidates = grid_2d(grid::GPC_LENGTH_SCALE, grid::GPC_SIGNAL_VAR, search.grid_steps)?;
            let (_, model) = best_candidate(&candidates, |l, s2| {
                let m = GpClassifier::fit(x, labels, l, s2).ok()?;
                Some((m.log_marginal_likelihood, m))
            })
            .ok_or_else(|| AppError::fit("GP classifier: no valid hyperparameter candidate."))?;
            tracing::debug!(l = model.length_scale, s2 = model.signal_var, "selected GP classifier");
            Ok(FittedClassifier::Gpc(model))
        }
    }
}

/// Evaluate all candidates in parallel and keep the highest score.
///
/// Returns the winning `(a, b)` pair and its payload; `None` if every candidate failed.
fn best_candidate<T, F>(candidates: &[(f64, f64)], eval: F) -> Option<((f64, f64), T)>
where
    T: Send,
    F: Fn(f64, f64) -> Option<(f64, T)> + Sync,
{
    let scored: Vec<(usize, f64, T)> = candidates
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &(a, b))| {
            let (score, payload) = eval(a, b)?;
            score.is_finite().then_some((idx, score, payload))
        })
        .collect();

    let skipped = candidates.len() - scored.len();
    if skipped > 0 {
        tracing::warn!(skipped, total = candidates.len(), "hyperparameter candidates failed numerically");
    }

    // Deterministic selection: highest score; ties go to the lower grid index.
    let mut best: Option<(usize, f64, T)> = None;
    for cand in scored {
        let better = match &best {
            None => true,
            Some((idx, score, _)) => cand.1 > *score || (cand.1 == *score && cand.0 < *idx),
        };
        if better {
            best = Some(cand);
        }
    }
    best.map(|(idx, _, payload)| (candidates[idx], payload))
}

/// Mean squared error over k folds; `None` if any fold fails.
fn cv_mse<M, F>(x: &DMatrix<f64>, y: &DVector<f64>, search: &SearchConfig, fit: F) -> Option<f64>
where
    M: Regressor,
    F: Fn(&DMatrix<f64>, &DVector<f64>) -> Result<M, AppError>,
{
    let n = x.nrows();
    let mut sse = 0.0;
    let mut count = 0usize;
    for held_out in kfold_indices(n, search.cv_folds, search.seed) {
        let train = complement(n, &held_out);
        if train.is_empty() || held_out.is_empty() {
            continue;
        }
        let model = fit(&x.select_rows(train.iter()), &y.select_rows(train.iter())).ok()?;
        let pred = model.predict(&x.select_rows(held_out.iter())).ok()?;
        for (k, &i) in held_out.iter().enumerate() {
            let r = y[i] - pred[k];
            sse += r * r;
        }
        count += held_out.len();
    }
    if count == 0 {
        return None;
    }
    Some(sse / count as f64)
}

/// Mean binary cross-entropy of kernel logistic regression over k folds.
fn cv_log_loss(x: &DMatrix<f64>, labels: &[bool], search: &SearchConfig, gamma: f64, c: f64) -> Option<f64> {
    let n = x.nrows();
    let mut total = 0.0;
    let mut count = 0usize;
    for held_out in kfold_indices(n, search.cv_folds, search.seed) {
        let train = complement(n, &held_out);
        if train.is_empty() || held_out.is_empty() {
            continue;
        }
        let train_labels: Vec<bool> = train.iter().map(|&i| labels[i]).collect();
        let model = KernelLogistic::fit(&x.select_rows(train.iter()), &train_labels, gamma, c).ok()?;
        let proba = model.predict_proba(&x.select_rows(held_out.iter())).ok()?;
        for (k, &i) in held_out.iter().enumerate() {
            // -log p(label), computed from the log-odds for stability.
            let p_hit = proba[k][1].clamp(1e-15, 1.0 - 1e-15);
            let logit = (p_hit / (1.0 - p_hit)).ln();
            total += if labels[i] { softplus(-logit) } else { softplus(logit) };
        }
        count += held_out.len();
    }
    if count == 0 {
        return None;
    }
    Some(total / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{SyntheticConfig, generate_database};

    fn search() -> SearchConfig {
        SearchConfig {
            grid_steps: 3,
            cv_folds: 3,
            seed: 11,
        }
    }

    #[test]
    fn best_candidate_prefers_lower_index_on_ties() {
        let candidates = vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        let (winner, _) = best_candidate(&candidates, |a, _| Some((if a > 1.5 { 1.0 } else { 0.0 }, ()))).unwrap();
        assert_eq!(winner, (2.0, 0.0));
    }

    #[test]
    fn best_candidate_skips_failures() {
        let candidates = vec![(1.0, 0.0), (2.0, 0.0)];
        let (winner, payload) = best_candidate(&candidates, |a, _| (a > 1.5).then_some((0.0, a))).unwrap();
        assert_eq!(winner, (2.0, 0.0));
        assert_eq!(payload, 2.0);
        assert!(best_candidate(&candidates, |_, _| None::<(f64, ())>).is_none());
    }

    #[test]
    fn ridge_grid_search_recovers_linear_trend() {
        let x = DMatrix::from_fn(30, 1, |i, _| i as f64 / 10.0);
        let y = DVector::from_fn(30, |i, _| 0.5 + 0.2 * x[(i, 0)]);
        let model = fit_regressor(RegressorKind::Ridge, &x, &y, &search()).unwrap();
        let pred = model.predict(&DMatrix::from_row_slice(1, 1, &[1.0])).unwrap();
        assert!((pred[0] - 0.7).abs() < 1e-2, "got {}", pred[0]);
        assert_eq!(model.kind(), RegressorKind::Ridge);
    }

    #[test]
    fn classifier_requires_both_classes() {
        let x = DMatrix::from_fn(6, 1, |i, _| i as f64);
        let err = fit_classifier(ClassifierKind::KernelLogistic, &x, &[true; 6], &search()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FIT);
    }

    #[test]
    fn surrogate_set_respects_partitions() {
        let db = generate_database(&SyntheticConfig {
            count: 60,
            seed: 3,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let set = fit_surrogates(&db, ClassifierKind::KernelLogistic, RegressorKind::KernelRidge, &search()).unwrap();
        let n_hit = db.iter().filter(|o| o.impacted).count();
        assert_eq!(set.n_hit, n_hit);
        assert_eq!(set.n_miss, db.len() - n_hit);
        assert_eq!(set.outcomes.len(), Outcome::ALL.len());
        assert!(set.outcome(Outcome::ReplacementFreq).is_some());
        assert_eq!(set.covariates, Covariate::ALL.to_vec());
    }

    #[test]
    fn too_small_partition_is_rejected() {
        let mut db = generate_database(&SyntheticConfig {
            count: 30,
            seed: 5,
            ..SyntheticConfig::default()
        })
        .unwrap();
        // Keep only two impacted designs.
        let mut kept_hits = 0;
        db.retain(|o| {
            if o.impacted {
                kept_hits += 1;
                kept_hits <= 2
            } else {
                true
            }
        });
        let err = fit_surrogates(&db, ClassifierKind::KernelLogistic, RegressorKind::Ridge, &search()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FIT);
    }
}
