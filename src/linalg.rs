//! Dense decompositions.
//!
//! Matrices travel through the crate as `ndarray::Array2<f64>`; faer does the
//! factorisations. Results come back sorted by decreasing eigen/singular
//! value with the matching vectors as columns.

use crate::error::{Error, Result};
use faer::{Mat, Side};
use ndarray::Array2;

fn to_faer(a: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Eigendecomposition of a symmetric matrix.
///
/// Returns `(values, vectors)` with values in decreasing order and
/// `vectors.column(k)` the eigenvector of `values[k]`.
pub(crate) fn symmetric_eigen(a: &Array2<f64>) -> Result<(Vec<f64>, Array2<f64>)> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: a.ncols(),
        });
    }
    let eig = to_faer(a)
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| Error::Decomposition(format!("{e:?}")))?;
    let u = eig.U();
    let s = eig.S().column_vector();

    // faer sorts ascending
    let values: Vec<f64> = (0..n).rev().map(|k| s[k]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(i, k)| u[(i, n - 1 - k)]);
    Ok((values, vectors))
}

/// Thin SVD of `a` (rows are observations).
///
/// Returns `(singular_values, v)` where `v` holds the right singular vectors
/// as columns, in decreasing singular value order.
pub(crate) fn right_singular_vectors(a: &Array2<f64>) -> Result<(Vec<f64>, Array2<f64>)> {
    let svd = to_faer(a)
        .thin_svd()
        .map_err(|e| Error::Decomposition(format!("{e:?}")))?;
    let v = svd.V();
    let s = svd.S().column_vector();
    let k = v.ncols();
    let values: Vec<f64> = (0..k).map(|i| s[i]).collect();
    let vectors = Array2::from_shape_fn((v.nrows(), k), |(i, j)| v[(i, j)]);
    Ok((values, vectors))
}

/// Inverse of a symmetric positive definite matrix through its
/// eigendecomposition, `U diag(1/λ) Uᵀ`.
///
/// Fails with [`Error::InversionFailed`] when the smallest eigenvalue is not
/// above `rcond * λ_max`.
pub(crate) fn spd_inverse(a: &Array2<f64>, rcond: f64) -> Result<Array2<f64>> {
    let (values, vectors) = symmetric_eigen(a)?;
    let max = values.first().copied().unwrap_or(0.0);
    let min = values.last().copied().unwrap_or(0.0);
    if !(max > 0.0) || !(min > rcond * max) {
        return Err(Error::InversionFailed);
    }
    let scaled = Array2::from_shape_fn(vectors.raw_dim(), |(i, k)| vectors[[i, k]] / values[k]);
    Ok(scaled.dot(&vectors.t()))
}

/// Inverse square root of a symmetric positive definite matrix.
pub(crate) fn spd_inverse_sqrt(a: &Array2<f64>, rcond: f64) -> Result<Array2<f64>> {
    let (values, vectors) = symmetric_eigen(a)?;
    let max = values.first().copied().unwrap_or(0.0);
    if values.iter().any(|&v| !(v > rcond * max)) {
        return Err(Error::InversionFailed);
    }
    let scaled = Array2::from_shape_fn(vectors.raw_dim(), |(i, k)| {
        vectors[[i, k]] / values[k].sqrt()
    });
    Ok(scaled.dot(&vectors.t()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_eigen_values_descend_and_vectors_match() -> Result<()> {
        let a = array![[2.0, 0.0], [0.0, 5.0]];
        let (values, vectors) = symmetric_eigen(&a)?;
        assert_abs_diff_eq!(values[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vectors[[1, 0]].abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vectors[[0, 1]].abs(), 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() -> Result<()> {
        let a = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        let inv = spd_inverse(&a, 1e-12)?;
        let id = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(id[[i, j]], expected, epsilon = 1e-10);
            }
        }
        let w = spd_inverse_sqrt(&a, 1e-12)?;
        let back = w.dot(&a).dot(&w);
        assert_abs_diff_eq!(back[[0, 0]], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(back[[0, 1]], 0.0, epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(spd_inverse(&a, 1e-12).unwrap_err(), Error::InversionFailed);
        assert_eq!(spd_inverse(&Array2::zeros((2, 2)), 1e-12).unwrap_err(), Error::InversionFailed);
    }

    #[test]
    fn test_svd_of_rank_one_matrix() -> Result<()> {
        let a = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let (s, v) = right_singular_vectors(&a)?;
        assert!(s[0] > 1.0);
        assert_abs_diff_eq!(s[1], 0.0, epsilon = 1e-10);
        // leading right vector is ±(1, 2)/√5
        assert_abs_diff_eq!((v[[1, 0]] / v[[0, 0]]), 2.0, epsilon = 1e-10);
        Ok(())
    }
}
