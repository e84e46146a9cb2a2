//! Dataset partitioning and matrix assembly.
//!
//! - hit / miss partition by the impact indicator
//! - seeded train / test split
//! - seeded k-fold assignment for cross-validation

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::{N_COVARIATES, Observation, Outcome};
use crate::error::AppError;

/// Split observations into (impacted, not impacted), preserving order.
pub fn partition_by_impact(observations: &[Observation]) -> (Vec<Observation>, Vec<Observation>) {
    observations.iter().cloned().partition(|o| o.impacted)
}

/// Seeded shuffle, then hold out `round(n * test_fraction)` rows for testing.
pub fn train_test_split(
    observations: &[Observation],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<Observation>, Vec<Observation>), AppError> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(AppError::usage(format!(
            "Test fraction must be in [0, 1), got {test_fraction}."
        )));
    }

    let mut idx: Vec<usize> = (0..observations.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let n_test = (observations.len() as f64 * test_fraction).round() as usize;
    let (test_idx, train_idx) = idx.split_at(n_test);

    let train = train_idx.iter().map(|&i| observations[i].clone()).collect();
    let test = test_idx.iter().map(|&i| observations[i].clone()).collect();
    Ok((train, test))
}

/// Held-out row indices for each of `k` folds (seeded, roughly equal sizes).
pub fn kfold_indices(n: usize, k: usize, seed: u64) -> Vec<Vec<usize>> {
    let k = k.clamp(1, n.max(1));
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let mut folds = vec![Vec::new(); k];
    for (pos, i) in idx.into_iter().enumerate() {
        folds[pos % k].push(i);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

/// Row indices not in `held_out` (which must be sorted).
pub fn complement(n: usize, held_out: &[usize]) -> Vec<usize> {
    (0..n).filter(|i| held_out.binary_search(i).is_err()).collect()
}

/// Covariate matrix in `Covariate::ALL` column order.
pub fn covariate_matrix(observations: &[Observation]) -> DMatrix<f64> {
    DMatrix::from_fn(observations.len(), N_COVARIATES, |i, j| observations[i].covariates[j])
}

pub fn outcome_vector(observations: &[Observation], outcome: Outcome) -> DVector<f64> {
    DVector::from_iterator(observations.len(), observations.iter().map(|o| o.outcome(outcome)))
}

pub fn impact_labels(observations: &[Observation]) -> Vec<bool> {
    observations.iter().map(|o| o.impacted).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(i: usize, impacted: bool) -> Observation {
        Observation {
            id: format!("r{i}"),
            covariates: [i as f64, 1.0, 3.0, 0.15],
            impacted,
            cost_ratio: i as f64 * 0.01,
            time_ratio: 0.0,
            replacement_freq: 0.0,
            collapse_prob: None,
        }
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let data: Vec<Observation> = (0..10).map(|i| obs(i, i % 3 == 0)).collect();
        let (hit, miss) = partition_by_impact(&data);
        assert_eq!(hit.len() + miss.len(), data.len());
        assert!(hit.iter().all(|o| o.impacted));
        assert!(miss.iter().all(|o| !o.impacted));
        assert_eq!(hit.len(), 4);
    }

    #[test]
    fn split_is_seeded_and_sized() {
        let data: Vec<Observation> = (0..50).map(|i| obs(i, false)).collect();
        let (train_a, test_a) = train_test_split(&data, 0.2, 7).unwrap();
        let (train_b, test_b) = train_test_split(&data, 0.2, 7).unwrap();
        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len(), 40);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a, train_b);

        let (train, test) = train_test_split(&data, 0.0, 7).unwrap();
        assert_eq!(train.len(), 50);
        assert!(test.is_empty());
        assert!(train_test_split(&data, 1.0, 7).is_err());
    }

    #[test]
    fn folds_cover_every_row_once() {
        let folds = kfold_indices(23, 5, 1);
        assert_eq!(folds.len(), 5);
        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
        assert_eq!(complement(23, &folds[0]).len(), 23 - folds[0].len());
    }

    #[test]
    fn matrices_follow_observation_order() {
        let data: Vec<Observation> = (0..3).map(|i| obs(i, false)).collect();
        let x = covariate_matrix(&data);
        assert_eq!(x.shape(), (3, N_COVARIATES));
        assert_eq!(x[(2, 0)], 2.0);
        assert_eq!(outcome_vector(&data, Outcome::CostRatio)[2], 0.02);
    }
}
