//! Probability-weighted expected-outcome prediction.
//!
//! For each covariate row `x`:
//!
//! ```text
//! E[y | x] = y_hit(x) · P(impact | x) + y_miss(x) · (1 - P(impact | x))
//! ```
//!
//! Picking the classifier's hard label and querying a single conditional regressor
//! produces a step at the classification boundary. Weighting both conditional
//! predictions by the impact probability keeps the surface continuous.
//!
//! Covariates are not checked against the training range; predictions outside it
//! are extrapolations.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::domain::Outcome;
use crate::error::AppError;
use crate::fit::SurrogateSet;
use crate::models::{ImpactClassifier, Regressor};

/// Per-row breakdown of one expected-value prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedValue {
    pub p_hit: f64,
    pub y_hit: f64,
    pub y_miss: f64,
    pub expected: f64,
}

impl ExpectedValue {
    pub fn p_miss(&self) -> f64 {
        1.0 - self.p_hit
    }
}

/// All outcome predictions for one design.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignPrediction {
    pub p_hit: f64,
    pub outcomes: Vec<(Outcome, ExpectedValue)>,
}

impl DesignPrediction {
    pub fn expected(&self, outcome: Outcome) -> Option<f64> {
        self.outcomes
            .iter()
            .find(|(o, _)| *o == outcome)
            .map(|(_, ev)| ev.expected)
    }
}

/// Expected outcome for every row of `x`.
pub fn predict_expected<C, R>(x: &DMatrix<f64>, classifier: &C, hit: &R, miss: &R) -> Result<Vec<f64>, AppError>
where
    C: ImpactClassifier + ?Sized,
    R: Regressor + ?Sized,
{
    Ok(predict_expected_detailed(x, classifier, hit, miss)?
        .into_iter()
        .map(|ev| ev.expected)
        .collect())
}

/// Like [`predict_expected`], keeping the probability and both conditional predictions.
pub fn predict_expected_detailed<C, R>(
    x: &DMatrix<f64>,
    classifier: &C,
    hit: &R,
    miss: &R,
) -> Result<Vec<ExpectedValue>, AppError>
where
    C: ImpactClassifier + ?Sized,
    R: Regressor + ?Sized,
{
    let p_hit = impact_probabilities(x, classifier)?;
    combine(x, &p_hit, hit, miss)
}

/// Predict every outcome of a fitted surrogate set, sharing one classifier pass.
pub fn predict_outcomes(set: &SurrogateSet, x: &DMatrix<f64>) -> Result<Vec<DesignPrediction>, AppError> {
    let p_hit = impact_probabilities(x, &set.classifier)?;

    let mut per_outcome = Vec::with_capacity(set.outcomes.len());
    for models in &set.outcomes {
        per_outcome.push((models.outcome, combine(x, &p_hit, &models.hit, &models.miss)?));
    }

    Ok((0..x.nrows())
        .map(|i| DesignPrediction {
            p_hit: p_hit[i],
            outcomes: per_outcome.iter().map(|(o, evs)| (*o, evs[i])).collect(),
        })
        .collect())
}

fn impact_probabilities<C>(x: &DMatrix<f64>, classifier: &C) -> Result<Vec<f64>, AppError>
where
    C: ImpactClassifier + ?Sized,
{
    let proba = classifier.predict_proba(x)?;
    if proba.len() != x.nrows() {
        return Err(AppError::fit(format!(
            "Classifier returned {} probabilities for {} rows.",
            proba.len(),
            x.nrows()
        )));
    }
    Ok(proba.iter().map(|p| p[1].clamp(0.0, 1.0)).collect())
}

fn combine<R>(x: &DMatrix<f64>, p_hit: &[f64], hit: &R, miss: &R) -> Result<Vec<ExpectedValue>, AppError>
where
    R: Regressor + ?Sized,
{
    let y_hit = hit.predict(x)?;
    let y_miss = miss.predict(x)?;
    let n = x.nrows();
    if y_hit.len() != n || y_miss.len() != n || p_hit.len() != n {
        return Err(AppError::fit("Regressor output length does not match the covariate rows."));
    }

    Ok((0..n)
        .map(|i| {
            let p = p_hit[i];
            ExpectedValue {
                p_hit: p,
                y_hit: y_hit[i],
                y_miss: y_miss[i],
                expected: y_hit[i] * p + y_miss[i] * (1.0 - p),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;

    /// Classifier returning a fixed impact probability per row.
    struct FixedProba(Vec<f64>);

    impl ImpactClassifier for FixedProba {
        fn predict_proba(&self, x: &DMatrix<f64>) -> Result<Vec<[f64; 2]>, AppError> {
            Ok((0..x.nrows()).map(|i| [1.0 - self.0[i], self.0[i]]).collect())
        }
    }

    /// Regressor returning `offset + slope * x[0]`.
    struct Linear {
        offset: f64,
        slope: f64,
    }

    impl Regressor for Linear {
        fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, AppError> {
            Ok(DVector::from_fn(x.nrows(), |i, _| self.offset + self.slope * x[(i, 0)]))
        }
    }

    fn constant(v: f64) -> Linear {
        Linear { offset: v, slope: 0.0 }
    }

    #[test]
    fn worked_example() {
        let x = DMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 0.15]);
        let out = predict_expected(&x, &FixedProba(vec![0.3]), &constant(10.0), &constant(2.0)).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0] - 4.4).abs() < 1e-12, "got {}", out[0]);

        let out = predict_expected(&x, &FixedProba(vec![0.7]), &constant(10.0), &constant(2.0)).unwrap();
        assert!((out[0] - 7.6).abs() < 1e-12, "got {}", out[0]);
    }

    #[test]
    fn probability_boundaries_select_one_regressor() {
        let x = DMatrix::from_row_slice(2, 1, &[0.5, 1.5]);
        let hit = Linear { offset: 1.0, slope: 2.0 };
        let miss = Linear { offset: -1.0, slope: 0.5 };
        let out = predict_expected_detailed(&x, &FixedProba(vec![1.0, 0.0]), &hit, &miss).unwrap();
        assert_eq!(out[0].expected, out[0].y_hit);
        assert_eq!(out[1].expected, out[1].y_miss);
    }

    #[test]
    fn expected_value_is_convex_combination() {
        let n = 11;
        let x = DMatrix::from_fn(n, 1, |i, _| i as f64 - 5.0);
        let probs: Vec<f64> = (0..n).map(|i| i as f64 / (n as f64 - 1.0)).collect();
        let hit = Linear { offset: 3.0, slope: 1.0 };
        let miss = Linear { offset: 0.0, slope: -2.0 };
        let out = predict_expected_detailed(&x, &FixedProba(probs), &hit, &miss).unwrap();
        for ev in &out {
            assert!((0.0..=1.0).contains(&ev.p_hit));
            assert!((ev.p_hit + ev.p_miss() - 1.0).abs() < 1e-15);
            let lo = ev.y_hit.min(ev.y_miss);
            let hi = ev.y_hit.max(ev.y_miss);
            assert!(ev.expected >= lo - 1e-12 && ev.expected <= hi + 1e-12);
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let x = DMatrix::from_row_slice(3, 1, &[0.1, 0.2, 0.3]);
        let classifier = FixedProba(vec![0.2, 0.5, 0.9]);
        let hit = Linear { offset: 1.0, slope: 1.0 };
        let miss = constant(0.5);
        let a = predict_expected(&x, &classifier, &hit, &miss).unwrap();
        let b = predict_expected(&x, &classifier, &hit, &miss).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trait_objects_are_accepted() {
        let x = DMatrix::from_row_slice(1, 1, &[0.0]);
        let classifier: Box<dyn ImpactClassifier> = Box::new(FixedProba(vec![0.5]));
        let hit: Box<dyn Regressor> = Box::new(constant(4.0));
        let miss: Box<dyn Regressor> = Box::new(constant(2.0));
        let out = predict_expected(&x, classifier.as_ref(), hit.as_ref(), miss.as_ref()).unwrap();
        assert!((out[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let x = DMatrix::<f64>::zeros(0, 4);
        let out = predict_expected(&x, &FixedProba(vec![]), &constant(1.0), &constant(0.0)).unwrap();
        assert!(out.is_empty());
    }
}
