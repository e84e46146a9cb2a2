//! Reporting utilities: design rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::Outcome;
use crate::predict::DesignPrediction;

/// Indices of the `top_n` designs with the lowest expected `outcome`.
///
/// Ties keep input order; rows without a finite prediction are skipped.
pub fn rank_designs(predictions: &[DesignPrediction], outcome: Outcome, top_n: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = predictions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.expected(outcome).filter(|v| v.is_finite()).map(|v| (i, v)))
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_n).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::ExpectedValue;

    fn pred(cost: f64) -> DesignPrediction {
        DesignPrediction {
            p_hit: 0.5,
            outcomes: vec![(
                Outcome::CostRatio,
                ExpectedValue {
                    p_hit: 0.5,
                    y_hit: cost,
                    y_miss: cost,
                    expected: cost,
                },
            )],
        }
    }

    #[test]
    fn ranks_lowest_expected_first() {
        let preds = vec![pred(0.3), pred(0.1), pred(f64::NAN), pred(0.2), pred(0.1)];
        assert_eq!(rank_designs(&preds, Outcome::CostRatio, 3), vec![1, 4, 3]);
        assert!(rank_designs(&preds, Outcome::TimeRatio, 3).is_empty());
    }
}
