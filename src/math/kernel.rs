//! Isotropic RBF kernels.
//!
//! Two parameterizations are in use:
//!
//! - `exp(-γ |a - b|²)` for kernel ridge and kernel logistic regression
//! - `s² exp(-|a - b|² / (2 l²))` for the Gaussian-process models
//!
//! Both reduce to the same matrix once `γ = 1 / (2 l²)`.

use nalgebra::DMatrix;

/// Pairwise squared Euclidean distances between the rows of `a` and `b`.
///
/// # Panics
/// Panics if `a` and `b` have different column counts. Callers validate shapes.
pub fn squared_distances(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    assert_eq!(a.ncols(), b.ncols(), "row dimension mismatch");
    let mut out = DMatrix::<f64>::zeros(a.nrows(), b.nrows());
    for i in 0..a.nrows() {
        for j in 0..b.nrows() {
            let mut d2 = 0.0;
            for k in 0..a.ncols() {
                let d = a[(i, k)] - b[(j, k)];
                d2 += d * d;
            }
            out[(i, j)] = d2;
        }
    }
    out
}

/// RBF kernel matrix `exp(-γ |a_i - b_j|²)`.
pub fn rbf(a: &DMatrix<f64>, b: &DMatrix<f64>, gamma: f64) -> DMatrix<f64> {
    squared_distances(a, b).map(|d2| (-gamma * d2).exp())
}

/// RBF kernel with length scale and signal variance.
pub fn rbf_scaled(a: &DMatrix<f64>, b: &DMatrix<f64>, length_scale: f64, signal_var: f64) -> DMatrix<f64> {
    rbf(a, b, gamma_from_length_scale(length_scale)) * signal_var
}

pub fn gamma_from_length_scale(length_scale: f64) -> f64 {
    1.0 / (2.0 * length_scale * length_scale)
}
