//! Eigen and generalized-eigen decompositions of Hermitian covariances.

use nalgebra::DMatrix;
use num_complex::Complex64;

/// One Hermitian (generalized) eigendecomposition.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Eigenvalues sorted descending.
    pub values: Vec<f64>,
    /// Matching eigenvectors as columns, orthonormal. For generalized
    /// decompositions these live in the noise-whitened domain.
    pub vectors: DMatrix<Complex64>,
    /// Whitening transform `L^-1` of the noise Cholesky factor, present
    /// only for generalized decompositions; steering vectors must pass
    /// through it before projection onto the subspaces.
    pub whitener: Option<DMatrix<Complex64>>,
}

/// Hermitian eigendecomposition with eigenvalues sorted descending.
pub fn hermitian_eigen(matrix: &DMatrix<Complex64>) -> Decomposition {
    let eigen = matrix.clone().symmetric_eigen();
    let n = eigen.eigenvalues.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let values = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let vectors = DMatrix::from_fn(n, n, |r, c| eigen.eigenvectors[(r, order[c])]);
    Decomposition {
        values,
        vectors,
        whitener: None,
    }
}

/// Generalized Hermitian eigendecomposition of `(signal, noise)` via
/// Cholesky whitening: factor `noise = L L^H` and eigendecompose
/// `L^-1 signal L^-H`. Fails when the noise covariance is not positive
/// definite.
pub fn generalized_eigen(
    signal: &DMatrix<Complex64>,
    noise: &DMatrix<Complex64>,
) -> Result<Decomposition, String> {
    let cholesky = noise
        .clone()
        .cholesky()
        .ok_or_else(|| "noise covariance is not positive definite".to_string())?;
    let whitener = cholesky
        .l()
        .try_inverse()
        .ok_or_else(|| "noise Cholesky factor is singular".to_string())?;

    let whitened = &whitener * signal * whitener.adjoint();
    let mut decomposition = hermitian_eigen(&whitened);
    decomposition.whitener = Some(whitener);
    Ok(decomposition)
}

/// Infer the active source count from the eigenvalue spread: eigenvalues
/// exceeding `threshold` times the smallest one are counted as sources,
/// clamped to `1..=mics-1` so a noise subspace always remains.
pub fn identify_sources(values: &[f64], threshold: f64) -> usize {
    let mics = values.len();
    debug_assert!(mics >= 2);
    let largest = values.first().copied().unwrap_or(0.0);
    let floor = values
        .last()
        .copied()
        .unwrap_or(0.0)
        .max(largest.abs() * 1e-12)
        .max(f64::MIN_POSITIVE);
    let count = values.iter().filter(|&&v| v > threshold * floor).count();
    count.clamp(1, mics - 1)
}

/// Relative Frobenius distance between two covariance estimates.
pub fn relative_difference(current: &DMatrix<Complex64>, previous: &DMatrix<Complex64>) -> f64 {
    let scale = previous.norm();
    if scale <= f64::MIN_POSITIVE {
        return f64::INFINITY;
    }
    (current - previous).norm() / scale
}
