//! Dense linear solvers.
//!
//! Two kinds of systems show up when fitting the surrogates:
//!
//! - tall least-squares problems (linear ridge), solved by SVD
//! - symmetric positive-definite kernel systems (GP, kernel ridge, IRLS Newton steps),
//!   solved by Cholesky
//!
//! Kernel matrices built from near-duplicate designs are often numerically singular,
//! so the Cholesky path retries with escalating diagonal jitter instead of failing.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Relative diagonal jitter levels tried in order (scaled by the mean |diagonal|).
const JITTER_LEVELS: [f64; 4] = [0.0, 1e-10, 1e-8, 1e-6];

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Cholesky-factor a symmetric matrix, adding jitter to the diagonal if needed.
///
/// Returns the factorization together with the absolute jitter that was added.
pub fn cholesky_jittered(a: &DMatrix<f64>) -> Option<(Cholesky<f64, Dyn>, f64)> {
    let n = a.nrows();
    if n == 0 || n != a.ncols() {
        return None;
    }

    let mean_diag = (0..n).map(|i| a[(i, i)].abs()).sum::<f64>() / n as f64;
    let scale = if mean_diag.is_finite() && mean_diag > 0.0 {
        mean_diag
    } else {
        1.0
    };

    for &rel in &JITTER_LEVELS {
        let jitter = rel * scale;
        let mut m = a.clone();
        if jitter > 0.0 {
            for i in 0..n {
                m[(i, i)] += jitter;
            }
        }
        if let Some(chol) = m.cholesky() {
            if chol.l_dirty().diagonal().iter().all(|v| v.is_finite() && *v > 0.0) {
                return Some((chol, jitter));
            }
        }
    }

    None
}

/// Solve `A x = b` for symmetric positive-definite `A`.
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let (chol, _) = cholesky_jittered(a)?;
    let x = chol.solve(b);
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// `log |A|` from the Cholesky factor of `A`.
pub fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|v| v.ln()).sum::<f64>()
}
