//! Hyperparameter grid generation.
//!
//! Every estimator has exactly two hyperparameters, searched on a deterministic
//! log-spaced grid. Grid search avoids the local optima of gradient-based
//! likelihood maximization and gives identical results for identical inputs.

use crate::error::AppError;

/// Inclusive search range of one hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HyperRange {
    pub min: f64,
    pub max: f64,
}

const fn range(min: f64, max: f64) -> HyperRange {
    HyperRange { min, max }
}

/// GP regression length scale (standardized covariates).
pub const GPR_LENGTH_SCALE: HyperRange = range(0.1, 10.0);
/// GP regression white-noise level (normalized targets).
pub const GPR_NOISE: HyperRange = range(1e-4, 10.0);
pub const KERNEL_RIDGE_GAMMA: HyperRange = range(0.01, 10.0);
pub const KERNEL_RIDGE_ALPHA: HyperRange = range(1e-4, 10.0);
/// Ridge has a single penalty; the second axis is unused.
pub const RIDGE_ALPHA: HyperRange = range(1e-4, 1e3);
pub const LOGISTIC_GAMMA: HyperRange = range(0.01, 10.0);
pub const LOGISTIC_C: HyperRange = range(0.01, 100.0);
pub const GPC_LENGTH_SCALE: HyperRange = range(0.1, 10.0);
pub const GPC_SIGNAL_VAR: HyperRange = range(0.1, 100.0);

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::usage(format!(
            "Invalid hyperparameter range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::usage("Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Cartesian product of two log-spaced axes, first axis varying slowest.
pub fn grid_2d(first: HyperRange, second: HyperRange, steps: usize) -> Result<Vec<(f64, f64)>, AppError> {
    let a = log_space(first.min, first.max, steps)?;
    let b = log_space(second.min, second.max, steps)?;
    let mut out = Vec::with_capacity(a.len() * b.len());
    for &u in &a {
        for &v in &b {
            out.push((u, v));
        }
    }
    Ok(out)
}

/// A single log-spaced axis, paired with a dummy second value.
pub fn grid_1d(axis: HyperRange, steps: usize) -> Result<Vec<(f64, f64)>, AppError> {
    Ok(log_space(axis.min, axis.max, steps)?
        .into_iter()
        .map(|v| (v, 0.0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn grid_2d_is_full_product() {
        let g = grid_2d(GPR_LENGTH_SCALE, GPR_NOISE, 4).unwrap();
        assert_eq!(g.len(), 16);
        assert!((g[0].0 - GPR_LENGTH_SCALE.min).abs() < 1e-12);
        assert!((g[3].1 - GPR_NOISE.max).abs() < 1e-12);
    }

    #[test]
    fn gpr_noise_reaches_past_unit_variance() {
        let v = log_space(GPR_NOISE.min, GPR_NOISE.max, 6).unwrap();
        assert!(v.iter().any(|&n| n > 1.0));
    }

    #[test]
    fn rejects_degenerate_ranges() {
        assert!(log_space(1.0, 1.0, 5).is_err());
        assert!(log_space(0.0, 1.0, 5).is_err());
        assert!(log_space(0.1, 1.0, 1).is_err());
    }
}
