//! Held-out evaluation of a fitted surrogate set.

use serde::{Deserialize, Serialize};

use crate::domain::{Observation, Outcome};
use crate::error::AppError;
use crate::fit::fitter::SurrogateSet;
use crate::fit::split::{covariate_matrix, impact_labels, outcome_vector, partition_by_impact};
use crate::math::{r_squared, rmse};
use crate::models::{ImpactClassifier, Regressor};
use crate::predict::predict_outcomes;

/// Binary confusion counts; "positive" means impact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[bool], predicted: &[bool]) -> Self {
        let mut cm = ConfusionMatrix::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a, p) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> Option<f64> {
        let n = self.total();
        (n > 0).then(|| (self.true_negative + self.true_positive) as f64 / n as f64)
    }
}

/// Goodness of fit on one set of held-out rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionScore {
    pub n: usize,
    /// `None` when the observations have no variance.
    pub r2: Option<f64>,
    pub rmse: Option<f64>,
}

impl RegressionScore {
    fn compute(observed: &[f64], predicted: &[f64]) -> Self {
        Self {
            n: observed.len(),
            r2: r_squared(observed, predicted),
            rmse: rmse(observed, predicted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDiagnostics {
    pub outcome: Outcome,
    /// Hit regressor on impacted test rows.
    pub hit: Option<RegressionScore>,
    /// Miss regressor on non-impacted test rows.
    pub miss: Option<RegressionScore>,
    /// Expected-value predictor on every test row.
    pub expected: RegressionScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub n_test: usize,
    pub confusion: ConfusionMatrix,
    pub outcomes: Vec<OutcomeDiagnostics>,
}

/// Score `set` on held-out rows; `Ok(None)` when there are none.
pub fn evaluate(set: &SurrogateSet, test: &[Observation]) -> Result<Option<Diagnostics>, AppError> {
    if test.is_empty() {
        return Ok(None);
    }

    let x = covariate_matrix(test);
    let predicted = set.classifier.predict_label(&x)?;
    let confusion = ConfusionMatrix::from_labels(&impact_labels(test), &predicted);

    let designs = predict_outcomes(set, &x)?;
    let (hit, miss) = partition_by_impact(test);
    let x_hit = covariate_matrix(&hit);
    let x_miss = covariate_matrix(&miss);

    let mut outcomes = Vec::with_capacity(set.outcomes.len());
    for models in &set.outcomes {
        let outcome = models.outcome;
        let observed: Vec<f64> = test.iter().map(|o| o.outcome(outcome)).collect();
        let expected: Vec<f64> = designs
            .iter()
            .map(|d| d.expected(outcome).unwrap_or(f64::NAN))
            .collect();

        outcomes.push(OutcomeDiagnostics {
            outcome,
            hit: score_partition(&models.hit, &x_hit, &hit, outcome)?,
            miss: score_partition(&models.miss, &x_miss, &miss, outcome)?,
            expected: RegressionScore::compute(&observed, &expected),
        });
    }

    tracing::info!(
        n_test = test.len(),
        accuracy = confusion.accuracy().unwrap_or(f64::NAN),
        "evaluated surrogates on test split"
    );

    Ok(Some(Diagnostics {
        n_test: test.len(),
        confusion,
        outcomes,
    }))
}

fn score_partition<R: Regressor>(
    model: &R,
    x: &nalgebra::DMatrix<f64>,
    rows: &[Observation],
    outcome: Outcome,
) -> Result<Option<RegressionScore>, AppError> {
    if rows.is_empty() {
        return Ok(None);
    }
    let pred = model.predict(x)?;
    let observed = outcome_vector(rows, outcome);
    Ok(Some(RegressionScore::compute(observed.as_slice(), pred.as_slice())))
}
