//! Synthetic isolated-building database.
//!
//! Stands in for the nonlinear simulation campaign when demoing or testing the
//! surrogate pipeline. Designs are drawn uniformly from the design space; impact
//! becomes likely as the gap ratio drops below one, and impacted designs carry
//! much larger (and noisier) repair consequences.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::fragility::Fragility;
use crate::domain::{Covariate, N_COVARIATES, Observation};
use crate::error::AppError;
use crate::math::sigmoid;

/// Steepness of the impact probability around a unit gap ratio.
const IMPACT_SLOPE: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticConfig {
    pub count: usize,
    pub seed: u64,
    /// Std dev of the additive outcome noise (before scaling per partition).
    pub noise: f64,
    pub fragility: Fragility,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            count: 400,
            seed: 42,
            noise: 0.02,
            fragility: Fragility::default(),
        }
    }
}

pub fn generate_database(config: &SyntheticConfig) -> Result<Vec<Observation>, AppError> {
    if config.count == 0 {
        return Err(AppError::usage("Synthetic row count must be > 0."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::usage("Synthetic noise must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::<f64>::new(0.0, 1.0).map_err(|e| AppError::fit(format!("Noise distribution error: {e}")))?;

    let mut rows = Vec::with_capacity(config.count);
    for i in 0..config.count {
        let mut covariates = [0.0; N_COVARIATES];
        for c in Covariate::ALL {
            let (lo, hi) = c.design_bounds();
            covariates[c.index()] = rng.gen_range(lo..=hi);
        }
        let [gap, ri, t_ratio, zeta] = covariates;

        let p_impact = sigmoid(IMPACT_SLOPE * (1.0 - gap));
        let impacted = rng.gen_bool(p_impact);

        // Weaker superstructures (low RI) drift more; impact amplifies drift.
        let base_drift = 0.015 / ri * (3.0 / t_ratio).sqrt() * (0.15 / zeta).powf(0.25);
        let drift_factor = if impacted { 2.5 } else { 1.0 };
        let max_drift = base_drift * drift_factor * (0.2 * normal.sample(&mut rng)).exp();
        let collapse_prob = config.fragility.probability(max_drift);

        let weakness = (2.25 - ri) / 1.75;
        let (cost, time, replacement) = if impacted {
            let severity = (1.0 - gap).max(0.0);
            let cost = 0.25 + 0.5 * severity + 0.15 * weakness + 3.0 * config.noise * normal.sample(&mut rng);
            let time = 0.8 * cost + 3.0 * config.noise * normal.sample(&mut rng);
            let replacement = 0.2 + 0.6 * severity + 0.1 * weakness;
            (cost, time, replacement)
        } else {
            let cost = 0.02 + 0.05 * weakness + 0.25 * config.noise * normal.sample(&mut rng);
            let time = 0.9 * cost + 0.25 * config.noise * normal.sample(&mut rng);
            let replacement = 0.01 * weakness;
            (cost, time, replacement)
        };

        rows.push(Observation {
            id: format!("synth-{:04}", i + 1),
            covariates,
            impacted,
            cost_ratio: cost.clamp(0.0, 1.0),
            time_ratio: time.clamp(0.0, 1.0),
            replacement_freq: replacement.clamp(0.0, 1.0),
            collapse_prob: Some(collapse_prob),
        });
    }

    let n_impacted = rows.iter().filter(|o| o.impacted).count();
    tracing::info!(count = rows.len(), n_impacted, seed = config.seed, "generated synthetic database");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_stay_inside_design_space() {
        let rows = generate_database(&SyntheticConfig::default()).unwrap();
        assert_eq!(rows.len(), 400);
        for o in &rows {
            for c in Covariate::ALL {
                let (lo, hi) = c.design_bounds();
                assert!((lo..=hi).contains(&o.covariate(c)));
            }
            assert!((0.0..=1.0).contains(&o.cost_ratio));
            assert!((0.0..=1.0).contains(&o.collapse_prob.unwrap()));
        }
    }

    #[test]
    fn both_impact_classes_appear() {
        let rows = generate_database(&SyntheticConfig::default()).unwrap();
        let hits = rows.iter().filter(|o| o.impacted).count();
        assert!(hits > 50 && hits < 350, "hits={hits}");

        let mean = |impacted: bool| {
            let v: Vec<f64> = rows.iter().filter(|o| o.impacted == impacted).map(|o| o.cost_ratio).collect();
            v.iter().sum::<f64>() / v.len() as f64
        };
        assert!(mean(true) > mean(false));
    }

    #[test]
    fn same_seed_same_rows() {
        let cfg = SyntheticConfig {
            count: 20,
            ..SyntheticConfig::default()
        };
        assert_eq!(generate_database(&cfg).unwrap(), generate_database(&cfg).unwrap());
        assert!(generate_database(&SyntheticConfig { count: 0, ..cfg }).is_err());
    }
}
