//! Dense linear-algebra helpers shared by the estimators and the bound checks.

use nalgebra::{DMatrix, DVector};

use crate::IdentError;

const SYMMETRY_TOL: f64 = 1e-9;

pub fn ensure_square(m: &DMatrix<f64>, context: &'static str) -> Result<usize, IdentError> {
    if m.nrows() != m.ncols() {
        return Err(IdentError::ShapeMismatch {
            context,
            expected: (m.nrows(), m.nrows()),
            got: m.shape(),
        });
    }
    Ok(m.nrows())
}

pub fn ensure_shape(
    m: &DMatrix<f64>,
    expected: (usize, usize),
    context: &'static str,
) -> Result<(), IdentError> {
    if m.shape() != expected {
        return Err(IdentError::ShapeMismatch {
            context,
            expected,
            got: m.shape(),
        });
    }
    Ok(())
}

pub fn ensure_len(v: &DVector<f64>, expected: usize, context: &'static str) -> Result<(), IdentError> {
    if v.len() != expected {
        return Err(IdentError::DimensionMismatch {
            context,
            expected,
            got: v.len(),
        });
    }
    Ok(())
}

/// Checks that `m` is a symmetric positive definite matrix.
///
/// Symmetry is tested up to a tolerance relative to the largest entry, and
/// definiteness by attempting a Cholesky factorization.
pub fn ensure_spd(m: &DMatrix<f64>, context: &'static str) -> Result<(), IdentError> {
    ensure_square(m, context)?;
    if m.nrows() == 0 || m.iter().any(|v| !v.is_finite()) {
        return Err(IdentError::NotPositiveDefinite { context });
    }
    let asymmetry = (m - m.transpose()).amax();
    if asymmetry > SYMMETRY_TOL * m.amax().max(1.0) {
        return Err(IdentError::NotPositiveDefinite { context });
    }
    if m.clone().cholesky().is_none() {
        return Err(IdentError::NotPositiveDefinite { context });
    }
    Ok(())
}

/// Lower-triangular Cholesky factor `L` with `m = L Lᵀ`.
pub fn cholesky_factor(m: &DMatrix<f64>, context: &'static str) -> Result<DMatrix<f64>, IdentError> {
    ensure_spd(m, context)?;
    m.clone()
        .cholesky()
        .map(|chol| chol.l())
        .ok_or(IdentError::NotPositiveDefinite { context })
}

/// Inverse of a square matrix.
///
/// A matrix whose smallest singular value is below `n · ε · σ_max` is treated
/// as singular, so rank-deficient Gram matrices are rejected even when LU
/// elimination leaves tiny nonzero pivots.
pub fn inverse(m: &DMatrix<f64>, context: &'static str) -> Result<DMatrix<f64>, IdentError> {
    let n = ensure_square(m, context)?;
    if n == 0 || m.iter().any(|v| !v.is_finite()) {
        return Err(IdentError::SingularMatrix { context });
    }
    let singular_values = m.singular_values();
    let tol = singular_values.max() * n as f64 * f64::EPSILON;
    if singular_values.min() <= tol {
        return Err(IdentError::SingularMatrix { context });
    }
    let inv = m
        .clone()
        .try_inverse()
        .ok_or(IdentError::SingularMatrix { context })?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(IdentError::SingularMatrix { context });
    }
    Ok(inv)
}

/// Principal square root of a symmetric positive definite matrix.
pub fn spd_sqrt(m: &DMatrix<f64>, context: &'static str) -> Result<DMatrix<f64>, IdentError> {
    spd_power(m, context, |lambda| lambda.sqrt())
}

/// Principal inverse square root `m^{-1/2}` of a symmetric positive definite matrix.
pub fn spd_inv_sqrt(m: &DMatrix<f64>, context: &'static str) -> Result<DMatrix<f64>, IdentError> {
    spd_power(m, context, |lambda| 1.0 / lambda.sqrt())
}

fn spd_power(
    m: &DMatrix<f64>,
    context: &'static str,
    f: impl Fn(f64) -> f64,
) -> Result<DMatrix<f64>, IdentError> {
    ensure_spd(m, context)?;
    let eig = m.clone().symmetric_eigen();
    if eig.eigenvalues.iter().any(|&lambda| lambda <= 0.0) {
        return Err(IdentError::NotPositiveDefinite { context });
    }
    let diag = DMatrix::from_diagonal(&eig.eigenvalues.map(f));
    Ok(&eig.eigenvectors * diag * eig.eigenvectors.transpose())
}

/// Induced 2-norm (largest singular value).
pub fn spectral_norm(m: &DMatrix<f64>) -> f64 {
    if m.is_empty() {
        return 0.0;
    }
    m.singular_values().max()
}

pub fn matrix_from_rows(rows: &[Vec<f64>], context: &'static str) -> Result<DMatrix<f64>, IdentError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|row| row.len() != ncols) {
        return Err(IdentError::DimensionMismatch {
            context,
            expected: ncols,
            got: bad.len(),
        });
    }
    Ok(DMatrix::from_fn(nrows, ncols, |r, c| rows[r][c]))
}

pub fn matrix_to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sqrt_of_diagonal_is_elementwise() {
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![10.0, 0.1]));
        let root = spd_sqrt(&m, "test").unwrap();
        assert_relative_eq!(root[(0, 0)], 10.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(root[(1, 1)], 0.1_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(root[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn sqrt_squares_back_for_dense_spd() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let root = spd_sqrt(&m, "test").unwrap();
        assert_relative_eq!(&root * &root, m, epsilon = 1e-10);

        let inv_root = spd_inv_sqrt(&m, "test").unwrap();
        let identity = &inv_root * &m * &inv_root;
        assert_relative_eq!(identity, DMatrix::identity(2, 2), epsilon = 1e-10);
    }

    #[test]
    fn rejects_indefinite_and_asymmetric() {
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert!(matches!(
            ensure_spd(&indefinite, "sigma"),
            Err(IdentError::NotPositiveDefinite { .. })
        ));

        let asymmetric = DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.0, 1.0]);
        assert!(ensure_spd(&asymmetric, "sigma").is_err());

        let rectangular = DMatrix::<f64>::zeros(2, 3);
        assert!(matches!(
            ensure_spd(&rectangular, "sigma"),
            Err(IdentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn singular_inverse_is_an_error() {
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(matches!(
            inverse(&singular, "xtx"),
            Err(IdentError::SingularMatrix { context: "xtx" })
        ));
    }

    #[test]
    fn spectral_norm_is_largest_singular_value() {
        let m = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, -4.0]);
        assert_relative_eq!(spectral_norm(&m), 4.0, epsilon = 1e-12);

        let rank_one = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert_relative_eq!(spectral_norm(&rank_one), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matrix_from_rows(&rows, "a").is_err());

        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let m = matrix_from_rows(&rows, "a").unwrap();
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(matrix_to_rows(&m), rows);
    }
}
