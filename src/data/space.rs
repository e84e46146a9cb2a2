//! Prediction grids over the design covariates.
//!
//! Every grid is returned as an `n × 4` matrix in `Covariate::ALL` column order,
//! ready to pass to the surrogates.

use nalgebra::DMatrix;

use crate::domain::{Covariate, DatasetStats, N_COVARIATES};
use crate::error::AppError;

/// Largest grid the predictors are asked to evaluate.
pub const MAX_GRID_ROWS: usize = 100_000;

/// `res^dims` rows, or a usage error past [`MAX_GRID_ROWS`].
fn grid_rows(res: usize, dims: u32) -> Result<usize, AppError> {
    match res.checked_pow(dims) {
        Some(n) if n <= MAX_GRID_ROWS => Ok(n),
        _ => Err(AppError::usage(format!(
            "Grid resolution {res} gives more than {MAX_GRID_ROWS} rows over {dims} axes."
        ))),
    }
}

/// A 2-D slice through the design space.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSpec {
    pub x: Covariate,
    pub y: Covariate,
    /// Points per varied axis.
    pub res: usize,
    /// Defaults to the training min/max.
    pub x_bounds: Option<(f64, f64)>,
    pub y_bounds: Option<(f64, f64)>,
    /// Values for the two held covariates; missing ones use the training median.
    pub fixed: Vec<(Covariate, f64)>,
}

/// Evenly spaced points from `lo` to `hi` inclusive.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64).collect(),
    }
}

/// `res²` rows: `x` varies fastest, then `y`; the other covariates are held fixed.
pub fn slice_grid(stats: &DatasetStats, spec: &SliceSpec) -> Result<DMatrix<f64>, AppError> {
    if spec.x == spec.y {
        return Err(AppError::usage("Slice axes must be two different covariates."));
    }
    if spec.res < 2 {
        return Err(AppError::usage("Grid resolution must be >= 2."));
    }
    let n = grid_rows(spec.res, 2)?;
    if let Some((c, _)) = spec.fixed.iter().find(|(c, _)| *c == spec.x || *c == spec.y) {
        return Err(AppError::usage(format!(
            "Cannot fix `{}`: it is a varied slice axis.",
            c.column()
        )));
    }

    let x_vals = axis_values(stats, spec.x, spec.x_bounds, spec.res)?;
    let y_vals = axis_values(stats, spec.y, spec.y_bounds, spec.res)?;

    let mut held = [0.0; N_COVARIATES];
    for c in Covariate::ALL {
        if c == spec.x || c == spec.y {
            continue;
        }
        held[c.index()] = match spec.fixed.iter().find(|(f, _)| *f == c) {
            Some((_, v)) => *v,
            None => {
                stats
                    .summary(c)
                    .ok_or_else(|| AppError::data(format!("No training summary for `{}`.", c.column())))?
                    .median
            }
        };
    }

    let mut grid = DMatrix::zeros(n, N_COVARIATES);
    let mut row = 0;
    for &yv in &y_vals {
        for &xv in &x_vals {
            let mut design = held;
            design[spec.x.index()] = xv;
            design[spec.y.index()] = yv;
            for (j, v) in design.iter().enumerate() {
                grid[(row, j)] = *v;
            }
            row += 1;
        }
    }
    Ok(grid)
}

/// Full factorial `res⁴` grid over the design bounds, last covariate fastest.
pub fn design_space(res: usize) -> Result<DMatrix<f64>, AppError> {
    if res < 2 {
        return Err(AppError::usage("Grid resolution must be >= 2."));
    }
    let n = grid_rows(res, N_COVARIATES as u32)?;
    let axes: Vec<Vec<f64>> = Covariate::ALL
        .iter()
        .map(|c| {
            let (lo, hi) = c.design_bounds();
            linspace(lo, hi, res)
        })
        .collect();

    let mut grid = DMatrix::zeros(n, N_COVARIATES);
    for row in 0..n {
        let mut rem = row;
        for j in (0..N_COVARIATES).rev() {
            grid[(row, j)] = axes[j][rem % res];
            rem /= res;
        }
    }
    Ok(grid)
}

fn axis_values(
    stats: &DatasetStats,
    covariate: Covariate,
    bounds: Option<(f64, f64)>,
    res: usize,
) -> Result<Vec<f64>, AppError> {
    let (lo, hi) = match bounds {
        Some(b) => b,
        None => {
            let s = stats
                .summary(covariate)
                .ok_or_else(|| AppError::data(format!("No training summary for `{}`.", covariate.column())))?;
            (s.min, s.max)
        }
    };
    if !(lo.is_finite() && hi.is_finite() && hi >= lo) {
        return Err(AppError::usage(format!(
            "Invalid bounds for `{}`: [{lo}, {hi}].",
            covariate.column()
        )));
    }
    Ok(linspace(lo, hi, res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CovariateSummary;

    fn stats() -> DatasetStats {
        DatasetStats {
            n_rows: 10,
            n_impacted: 4,
            covariates: Covariate::ALL
                .iter()
                .map(|&c| CovariateSummary {
                    covariate: c,
                    min: 1.0,
                    median: 2.0,
                    max: 3.0,
                })
                .collect(),
        }
    }

    #[test]
    fn slice_holds_other_covariates_at_median() {
        let spec = SliceSpec {
            x: Covariate::GapRatio,
            y: Covariate::StrengthRatio,
            res: 3,
            x_bounds: None,
            y_bounds: Some((0.5, 1.5)),
            fixed: vec![(Covariate::DampingRatio, 0.2)],
        };
        let g = slice_grid(&stats(), &spec).unwrap();
        assert_eq!(g.shape(), (9, 4));
        // x fastest
        assert_eq!(g[(0, 0)], 1.0);
        assert_eq!(g[(1, 0)], 2.0);
        assert_eq!(g[(3, 1)], 1.0);
        assert_eq!(g[(8, 1)], 1.5);
        for i in 0..9 {
            assert_eq!(g[(i, 2)], 2.0);
            assert_eq!(g[(i, 3)], 0.2);
        }
    }

    #[test]
    fn slice_rejects_bad_specs() {
        let mut spec = SliceSpec {
            x: Covariate::GapRatio,
            y: Covariate::GapRatio,
            res: 3,
            x_bounds: None,
            y_bounds: None,
            fixed: vec![],
        };
        assert!(slice_grid(&stats(), &spec).is_err());
        spec.y = Covariate::PeriodRatio;
        spec.fixed = vec![(Covariate::GapRatio, 1.0)];
        assert!(slice_grid(&stats(), &spec).is_err());
    }

    #[test]
    fn design_space_covers_bounds() {
        let g = design_space(3).unwrap();
        assert_eq!(g.nrows(), 81);
        assert_eq!(g[(0, 0)], 0.6);
        assert_eq!(g[(80, 1)], 2.25);
        assert!((g[(1, 3)] - 0.175).abs() < 1e-12);
        assert!(design_space(1).is_err());
    }

    #[test]
    fn oversized_grids_are_usage_errors() {
        let err = design_space(65_536).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
        assert!(design_space(300).is_err());
        assert_eq!(design_space(17).unwrap().nrows(), 83_521);
        assert!(design_space(18).is_err());

        let spec = SliceSpec {
            x: Covariate::GapRatio,
            y: Covariate::PeriodRatio,
            res: 1_001,
            x_bounds: None,
            y_bounds: None,
            fixed: vec![],
        };
        assert!(slice_grid(&stats(), &spec).is_err());
        assert!(slice_grid(&stats(), &SliceSpec { res: usize::MAX, ..spec }).is_err());
    }
}
