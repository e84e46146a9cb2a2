//! Lognormal collapse fragility on peak story drift.

use serde::{Deserialize, Serialize};

use crate::math::{normal_cdf, normal_ppf};

/// Drift anchored at the 84th percentile of the collapse fragility.
pub const ANCHOR_DRIFT: f64 = 0.10;
const ANCHOR_QUANTILE: f64 = 0.84;
pub const DEFAULT_BETA: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fragility {
    /// Median drift capacity.
    pub theta: f64,
    /// Lognormal dispersion.
    pub beta: f64,
}

impl Fragility {
    /// Fragility whose 84th-percentile drift is [`ANCHOR_DRIFT`].
    pub fn anchored(beta: f64) -> Option<Self> {
        if !(beta.is_finite() && beta > 0.0) {
            return None;
        }
        Some(Self {
            theta: anchored_median(beta),
            beta,
        })
    }

    /// `P(collapse | drift)`; zero for non-positive drift.
    pub fn probability(&self, drift: f64) -> f64 {
        if drift <= 0.0 {
            return 0.0;
        }
        normal_cdf((drift / self.theta).ln() / self.beta)
    }
}

impl Default for Fragility {
    fn default() -> Self {
        Self {
            theta: anchored_median(DEFAULT_BETA),
            beta: DEFAULT_BETA,
        }
    }
}

fn anchored_median(beta: f64) -> f64 {
    (ANCHOR_DRIFT.ln() - beta * normal_ppf(ANCHOR_QUANTILE)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_drift_is_84th_percentile() {
        let f = Fragility::default();
        assert!((f.probability(ANCHOR_DRIFT) - 0.84).abs() < 1e-4);
        assert!((f.probability(f.theta) - 0.5).abs() < 1e-6);
        assert!(f.theta < ANCHOR_DRIFT);
    }

    #[test]
    fn probability_is_monotone() {
        let f = Fragility::anchored(0.4).unwrap();
        let drifts = [0.0, 0.005, 0.02, 0.05, 0.1, 0.3];
        let p: Vec<f64> = drifts.iter().map(|&d| f.probability(d)).collect();
        assert_eq!(p[0], 0.0);
        assert!(p.windows(2).all(|w| w[1] >= w[0]));
        assert!(Fragility::anchored(0.0).is_none());
    }
}
