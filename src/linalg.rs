//! Thin wrapper over `nalgebra`'s dense linear-algebra primitives.
//!
//! Every higher-level component (builders, `StatisticalModel`) goes through
//! this module rather than calling `nalgebra` directly, so the numerical
//! tolerance and the "which singular values survive" rule live in exactly
//! one place.

use nalgebra::{DMatrix, DVector};

use crate::error::{StatismoError, StatismoResult};

/// Singular values / eigenvalues at or below this are treated as zero.
pub const TOLERANCE: f64 = 1e-5;

/// Which decomposition a `PCAModelBuilder` should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigenMethod {
    JacobiSvd,
    SelfAdjointEigen,
}

/// Thin SVD result, singular values sorted descending with `u`/`v` columns
/// permuted to match.
pub struct Svd {
    pub singular_values: DVector<f64>,
    pub u: Option<DMatrix<f64>>,
    pub v: Option<DMatrix<f64>>,
}

/// Computes a thin SVD of `matrix`, sorted by descending singular value.
///
/// `nalgebra`'s `SVD` does not document a sort order, so this always
/// re-sorts explicitly rather than relying on incidental ordering.
pub fn thin_svd(matrix: &DMatrix<f64>, compute_u: bool, compute_v: bool) -> Svd {
    let svd = nalgebra::linalg::SVD::new(matrix.clone(), compute_u, compute_v);

    let n = svd.singular_values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let singular_values = DVector::from_iterator(n, order.iter().map(|&i| svd.singular_values[i]));

    let u = svd.u.map(|u| {
        DMatrix::from_columns(&order.iter().map(|&i| u.column(i).clone_owned()).collect::<Vec<_>>())
    });
    let v = svd.v_t.map(|v_t| {
        let v = v_t.transpose();
        DMatrix::from_columns(&order.iter().map(|&i| v.column(i).clone_owned()).collect::<Vec<_>>())
    });

    Svd {
        singular_values,
        u,
        v,
    }
}

/// Eigendecomposition of a symmetric matrix, sorted by descending eigenvalue.
pub struct SymmetricEigenDecomposition {
    pub eigenvalues: DVector<f64>,
    pub eigenvectors: DMatrix<f64>,
}

pub fn symmetric_eigen(matrix: &DMatrix<f64>) -> SymmetricEigenDecomposition {
    let eigen = nalgebra::linalg::SymmetricEigen::new(matrix.clone());

    let n = eigen.eigenvalues.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let eigenvalues = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
    let eigenvectors = DMatrix::from_columns(
        &order
            .iter()
            .map(|&i| eigen.eigenvectors.column(i).clone_owned())
            .collect::<Vec<_>>(),
    );

    SymmetricEigenDecomposition {
        eigenvalues,
        eigenvectors,
    }
}

/// Counts how many of the (descending) `values` survive the tolerance test
/// `(value - noise_variance - TOLERANCE) > 0`.
pub fn count_components_above_tolerance(values: &DVector<f64>, noise_variance: f64) -> usize {
    values
        .iter()
        .take_while(|&&v| v - noise_variance - TOLERANCE > 0.0)
        .count()
}

/// Builds a length-`values.len()` vector whose first `keep` entries are
/// `1/sqrt(values[i])` and whose remaining entries are zero.
pub fn reciprocal_sqrt(values: &DVector<f64>, keep: usize) -> DVector<f64> {
    DVector::from_iterator(
        values.len(),
        values.iter().enumerate().map(|(i, &v)| {
            if i < keep {
                1.0 / v.sqrt()
            } else {
                0.0
            }
        }),
    )
}

/// The closed-form MAP update shared by `StatisticalModel::compute_coefficients_for_point_values`
/// and `PosteriorModelBuilder`:
///
/// `W = (diag(1/prior_variance) + Usᵀ Σ_obs⁻¹ Us)⁻¹`, `α* = W Usᵀ Σ_obs⁻¹ r`.
///
/// Returns `(alpha, w)` — the posterior coefficient mean and the posterior
/// covariance in coefficient space.
pub fn posterior_coefficients(
    u_selected: &DMatrix<f64>,
    prior_variance: &DVector<f64>,
    sigma_obs: &DMatrix<f64>,
    residual: &DVector<f64>,
) -> StatismoResult<(DVector<f64>, DMatrix<f64>)> {
    let chol = sigma_obs.clone().cholesky().ok_or_else(|| {
        StatismoError::invalid_data("observation covariance matrix is not symmetric positive definite")
    })?;

    let sigma_obs_inv_u = chol.solve(u_selected);
    let sigma_obs_inv_r = chol.solve(residual);

    let k = prior_variance.len();
    let mut w_inv = DMatrix::<f64>::zeros(k, k);
    for i in 0..k {
        w_inv[(i, i)] = 1.0 / prior_variance[i];
    }
    w_inv += u_selected.transpose() * &sigma_obs_inv_u;

    let w_chol = w_inv
        .clone()
        .cholesky()
        .ok_or_else(|| StatismoError::internal("posterior precision matrix is not invertible"))?;
    let w = w_chol.inverse();

    let rhs = u_selected.transpose() * &sigma_obs_inv_r;
    let alpha = &w * &rhs;

    Ok((alpha, w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svd_singular_values_sorted_descending() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let svd = thin_svd(&m, true, true);
        for w in svd.singular_values.as_slice().windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn symmetric_eigen_sorted_descending() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 5.0]);
        let eigen = symmetric_eigen(&m);
        assert!(eigen.eigenvalues[0] >= eigen.eigenvalues[1]);
        assert!((eigen.eigenvalues[0] - 5.0).abs() < 1e-8);
    }

    #[test]
    fn tolerance_counts_above_noise_floor() {
        let values = DVector::from_vec(vec![10.0, 5.0, 1e-7, 1e-8]);
        assert_eq!(count_components_above_tolerance(&values, 0.0), 2);
        assert_eq!(count_components_above_tolerance(&values, 4.0), 1);
    }
}
