//! `StatisticalModel`: the central entity, representing the Gaussian
//! `N(mean, U diag(variance) Uᵀ + noise_variance I)` over sample vectors of
//! length `p`. Immutable after construction; every query is a pure function
//! of the stored state, safe to call concurrently.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::constraints::NoiseSpec;
use crate::error::{StatismoError, StatismoResult};
use crate::linalg::{self, TOLERANCE};
use crate::model_info::ModelInfo;
use crate::representer::Representer;

pub struct StatisticalModel<R: Representer> {
    representer: R,
    mean: DVector<f64>,
    orthonormal_basis: DMatrix<f64>,
    pca_variance: DVector<f64>,
    noise_variance: f64,
    model_info: ModelInfo,
}

impl<R: Representer> StatisticalModel<R> {
    /// Validating constructor. Every builder in this crate goes through
    /// this, never assembling a model by hand.
    pub fn new(
        representer: R,
        mean: DVector<f64>,
        orthonormal_basis: DMatrix<f64>,
        pca_variance: DVector<f64>,
        noise_variance: f64,
        model_info: ModelInfo,
    ) -> StatismoResult<Self> {
        let p = representer.vector_length();
        let k = pca_variance.len();

        if mean.len() != p {
            return Err(StatismoError::bad_input(format!(
                "mean length {} does not match representer vector length {}",
                mean.len(),
                p
            )));
        }
        if orthonormal_basis.nrows() != p || orthonormal_basis.ncols() != k {
            return Err(StatismoError::bad_input(format!(
                "basis shape {}x{} does not match (p={}, k={})",
                orthonormal_basis.nrows(),
                orthonormal_basis.ncols(),
                p,
                k
            )));
        }
        if noise_variance < 0.0 {
            return Err(StatismoError::bad_input("noise variance must be non-negative"));
        }
        if k > 0 {
            if pca_variance.iter().any(|&v| v <= 0.0) {
                return Err(StatismoError::bad_input("PCA variances must be strictly positive"));
            }
            for w in pca_variance.as_slice().windows(2) {
                if w[0] < w[1] - 1e-6 {
                    return Err(StatismoError::bad_input("PCA variances must be sorted descending"));
                }
            }
            let gram = orthonormal_basis.transpose() * &orthonormal_basis;
            let identity = DMatrix::<f64>::identity(k, k);
            let max_dev = (gram - identity).iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
            if max_dev >= 1e-4 {
                return Err(StatismoError::bad_input(format!(
                    "basis columns are not orthonormal (max deviation {max_dev})"
                )));
            }
        }

        Ok(Self {
            representer,
            mean,
            orthonormal_basis,
            pca_variance,
            noise_variance,
            model_info,
        })
    }

    pub fn representer(&self) -> &R {
        &self.representer
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    pub fn p(&self) -> usize {
        self.mean.len()
    }

    pub fn num_components(&self) -> usize {
        self.pca_variance.len()
    }

    pub fn pca_variance(&self) -> &DVector<f64> {
        &self.pca_variance
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    pub fn mean_vector(&self) -> &DVector<f64> {
        &self.mean
    }

    /// The orthonormal basis `U` itself, unscaled.
    pub fn orthonormal_pca_basis_matrix(&self) -> &DMatrix<f64> {
        &self.orthonormal_basis
    }

    /// `U * diag(sqrt(variance))`, the basis used when drawing samples.
    pub fn pca_basis_matrix(&self) -> DMatrix<f64> {
        self.scaled_basis()
    }

    fn scaled_basis(&self) -> DMatrix<f64> {
        let mut scaled = self.orthonormal_basis.clone();
        for (j, mut col) in scaled.column_iter_mut().enumerate() {
            col *= self.pca_variance[j].max(0.0).sqrt();
        }
        scaled
    }

    fn check_vector_length(&self, x: &DVector<f64>) -> StatismoResult<()> {
        if x.len() != self.p() {
            return Err(StatismoError::bad_input(format!(
                "vector length {} does not match model length {}",
                x.len(),
                self.p()
            )));
        }
        Ok(())
    }

    fn check_coefficient_length(&self, alpha: &DVector<f64>) -> StatismoResult<()> {
        if alpha.len() != self.num_components() {
            return Err(StatismoError::bad_input(format!(
                "coefficient vector length {} does not match component count {}",
                alpha.len(),
                self.num_components()
            )));
        }
        Ok(())
    }

    /// Row range `[start, start+d)` of the full vector space occupied by
    /// `point`, where `d = representer.dimensions()`.
    pub(crate) fn point_row_range(&self, point: &R::Point) -> StatismoResult<std::ops::Range<usize>> {
        let index = self.representer.point_to_index(point)?;
        let d = self.representer.dimensions();
        let start = index * d;
        Ok(start..start + d)
    }

    pub fn draw_mean(&self) -> DVector<f64> {
        self.mean.clone()
    }

    pub fn draw_mean_at_point(&self, point: &R::Point) -> StatismoResult<DVector<f64>> {
        let range = self.point_row_range(point)?;
        Ok(DVector::from_iterator(range.len(), range.map(|i| self.mean[i])))
    }

    /// `mean + U diag(sqrt(variance)) alpha`, plus optional per-entry
    /// Gaussian noise of variance `noise_variance`.
    pub fn draw_sample(
        &self,
        alpha: &DVector<f64>,
        add_noise: bool,
        rng: &mut impl Rng,
    ) -> StatismoResult<DVector<f64>> {
        self.check_coefficient_length(alpha)?;
        let mut sample = &self.mean + self.scaled_basis() * alpha;
        if add_noise && self.noise_variance > 0.0 {
            sample += gaussian_noise_vector(rng, self.noise_variance, self.p());
        }
        Ok(sample)
    }

    pub fn draw_sample_at_point(
        &self,
        alpha: &DVector<f64>,
        point: &R::Point,
    ) -> StatismoResult<DVector<f64>> {
        self.check_coefficient_length(alpha)?;
        let range = self.point_row_range(point)?;
        let basis = self.scaled_basis();
        let mean_part = DVector::from_iterator(range.len(), range.clone().map(|i| self.mean[i]));
        let basis_rows = basis.rows(range.start, range.len());
        Ok(mean_part + basis_rows * alpha)
    }

    /// The `j`-th basis direction, scaled by `sqrt(variance[j])`.
    pub fn draw_pca_basis_sample(&self, j: usize) -> StatismoResult<DVector<f64>> {
        if j >= self.num_components() {
            return Err(StatismoError::out_of_range(format!(
                "component index {} out of range (k = {})",
                j,
                self.num_components()
            )));
        }
        Ok(self.orthonormal_basis.column(j) * self.pca_variance[j].sqrt())
    }

    /// MAP coefficients given `x`, the ridge-regularized closed form when
    /// `noise_variance > 0`.
    pub fn compute_coefficients(&self, x: &DVector<f64>) -> StatismoResult<DVector<f64>> {
        self.check_vector_length(x)?;
        if self.num_components() == 0 {
            return Err(StatismoError::bad_input("model has zero components"));
        }

        let diff = x - &self.mean;
        let proj = self.orthonormal_basis.transpose() * &diff;

        let k = self.num_components();
        let mut alpha = DVector::zeros(k);
        for i in 0..k {
            let sigma2 = self.pca_variance[i];
            if self.noise_variance > 0.0 {
                alpha[i] = sigma2.sqrt() / (sigma2 + self.noise_variance) * proj[i];
            } else {
                alpha[i] = proj[i] / sigma2.sqrt();
            }
        }
        Ok(alpha)
    }

    /// As `compute_coefficients`, but using only the rows of `U`/`mean`
    /// selected by `points`, under the given observation noise.
    pub fn compute_coefficients_for_point_values(
        &self,
        points: &[(R::Point, Vec<f64>)],
        noise: NoiseSpec<'_>,
    ) -> StatismoResult<DVector<f64>> {
        if points.is_empty() {
            return Err(StatismoError::bad_input("no point constraints supplied"));
        }
        if self.num_components() == 0 {
            return Err(StatismoError::bad_input("model has zero components"));
        }

        let d = self.representer.dimensions();
        if let NoiseSpec::PerPoint(covs) = &noise {
            if covs.len() != points.len() {
                return Err(StatismoError::bad_input(
                    "per-point covariance list length does not match constraint count",
                ));
            }
        }

        let mut rows = Vec::new();
        let mut residual_entries = Vec::new();
        for (point, value) in points {
            if value.len() != d {
                return Err(StatismoError::bad_input(format!(
                    "constraint value has {} entries, expected {}",
                    value.len(),
                    d
                )));
            }
            let range = self.point_row_range(point)?;
            for (offset, row_idx) in range.enumerate() {
                rows.push(self.orthonormal_basis.row(row_idx).clone_owned());
                residual_entries.push(value[offset] - self.mean[row_idx]);
            }
        }

        let m = rows.len();
        let u_selected = DMatrix::from_rows(&rows);
        let residual = DVector::from_vec(residual_entries);

        let sigma_obs = match noise {
            NoiseSpec::Uniform(variance) => DMatrix::identity(m, m) * variance,
            NoiseSpec::PerPoint(covs) => {
                let mut sigma = DMatrix::<f64>::zeros(m, m);
                let mut offset = 0;
                for cov in covs {
                    let size = cov.nrows();
                    sigma
                        .view_mut((offset, offset), (size, size))
                        .copy_from(cov);
                    offset += size;
                }
                sigma
            }
        };

        let (beta, _w) =
            linalg::posterior_coefficients(&u_selected, &self.pca_variance, &sigma_obs, &residual)?;

        // `posterior_coefficients` returns the posterior mean in the same
        // units as `pca_variance` (i.e. un-standardized); convert to the
        // standardized alpha convention used by `compute_coefficients`.
        let k = self.num_components();
        let mut alpha = DVector::zeros(k);
        for i in 0..k {
            alpha[i] = beta[i] / self.pca_variance[i].sqrt();
        }
        Ok(alpha)
    }

    /// Standard Gaussian log-density under the factored covariance, via the
    /// matrix determinant lemma / Woodbury identity so the full `p x p`
    /// covariance is never materialized.
    pub fn compute_probability(&self, x: &DVector<f64>) -> StatismoResult<f64> {
        self.check_vector_length(x)?;
        let p = self.p() as f64;
        let k = self.num_components();
        let diff = x - &self.mean;
        let proj = self.orthonormal_basis.transpose() * &diff;

        if self.noise_variance > TOLERANCE {
            let mut log_det = (p - k as f64) * self.noise_variance.ln();
            let mut quad_correction = 0.0;
            for i in 0..k {
                let sigma2 = self.pca_variance[i];
                log_det += (self.noise_variance + sigma2).ln();
                let m_inv = sigma2 * self.noise_variance / (sigma2 + self.noise_variance);
                quad_correction += m_inv / self.noise_variance.powi(2) * proj[i] * proj[i];
            }
            let quad = diff.norm_squared() / self.noise_variance - quad_correction;
            Ok(-0.5 * (p * (2.0 * PI).ln() + log_det + quad))
        } else {
            let reconstructed = &self.orthonormal_basis * &proj;
            let residual_norm = (&diff - &reconstructed).norm();
            if residual_norm > 1e-6 {
                return Ok(f64::NEG_INFINITY);
            }
            let mut log_det = 0.0;
            let mut quad = 0.0;
            for i in 0..k {
                log_det += self.pca_variance[i].ln();
                quad += proj[i] * proj[i] / self.pca_variance[i];
            }
            Ok(-0.5 * (k as f64 * (2.0 * PI).ln() + log_det + quad))
        }
    }

    pub fn compute_mahalanobis_distance(&self, x: &DVector<f64>) -> StatismoResult<f64> {
        self.check_vector_length(x)?;
        let diff = x - &self.mean;
        let proj = self.orthonormal_basis.transpose() * &diff;
        let k = self.num_components();

        if self.noise_variance > TOLERANCE {
            let mut quad_correction = 0.0;
            for i in 0..k {
                let sigma2 = self.pca_variance[i];
                let m_inv = sigma2 * self.noise_variance / (sigma2 + self.noise_variance);
                quad_correction += m_inv / self.noise_variance.powi(2) * proj[i] * proj[i];
            }
            let quad = diff.norm_squared() / self.noise_variance - quad_correction;
            Ok(quad.max(0.0).sqrt())
        } else {
            let reconstructed = &self.orthonormal_basis * &proj;
            let residual_norm = (&diff - &reconstructed).norm();
            if residual_norm > 1e-6 {
                return Ok(f64::INFINITY);
            }
            let mut quad = 0.0;
            for i in 0..k {
                quad += proj[i] * proj[i] / self.pca_variance[i];
            }
            Ok(quad.max(0.0).sqrt())
        }
    }

    /// `U_i diag(variance) U_jᵀ + (i==j ? noise_variance * I : 0)`.
    pub fn get_covariance_at_point(
        &self,
        point_i: &R::Point,
        point_j: &R::Point,
    ) -> StatismoResult<DMatrix<f64>> {
        let range_i = self.point_row_range(point_i)?;
        let range_j = self.point_row_range(point_j)?;

        let u_i = self.orthonormal_basis.rows(range_i.start, range_i.len());
        let u_j = self.orthonormal_basis.rows(range_j.start, range_j.len());

        let mut cov = u_i * DMatrix::from_diagonal(&self.pca_variance) * u_j.transpose();

        if point_i == point_j {
            for d in 0..cov.nrows() {
                cov[(d, d)] += self.noise_variance;
            }
        }
        Ok(cov)
    }
}

fn gaussian_noise_vector(rng: &mut impl Rng, variance: f64, len: usize) -> DVector<f64> {
    let std_dev = variance.sqrt();
    DVector::from_iterator(len, (0..len).map(|_| std_dev * box_muller(rng)))
}

/// Standard normal sample via the Box-Muller transform.
fn box_muller(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representer::VectorRepresenter;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn one_component_model(noise_variance: f64) -> StatisticalModel<VectorRepresenter> {
        let representer = VectorRepresenter::new(1);
        let mean = DVector::from_vec(vec![0.0]);
        let basis = DMatrix::from_vec(1, 1, vec![1.0]);
        let variance = DVector::from_vec(vec![1.0]);
        StatisticalModel::new(representer, mean, basis, variance, noise_variance, ModelInfo::empty()).unwrap()
    }

    #[test]
    fn mean_round_trip_gives_zero_coefficients() {
        let model = one_component_model(0.0);
        let alpha = model.compute_coefficients(&model.draw_mean()).unwrap();
        assert!(alpha[0].abs() < 1e-10);
    }

    #[test]
    fn sample_round_trip_recovers_coefficients_without_noise() {
        let model = one_component_model(0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let alpha_in = DVector::from_vec(vec![3.0]);
        let sample = model.draw_sample(&alpha_in, false, &mut rng).unwrap();
        let alpha_out = model.compute_coefficients(&sample).unwrap();
        assert!((alpha_in[0] - alpha_out[0]).abs() < 1e-8);
    }

    #[test]
    fn coefficients_under_noise_scale_by_precision_ratio() {
        let model = one_component_model(0.25);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let alpha_in = DVector::from_vec(vec![2.0]);
        let sample = model.draw_sample(&alpha_in, false, &mut rng).unwrap();
        let alpha_out = model.compute_coefficients(&sample).unwrap();
        assert!((alpha_out[0] - 1.6).abs() < 1e-8);
    }

    #[test]
    fn mahalanobis_distance_at_mean_is_zero() {
        let model = one_component_model(0.0);
        let d = model.compute_mahalanobis_distance(&model.draw_mean()).unwrap();
        assert!(d.abs() < 1e-8);
    }

    #[test]
    fn rejects_mismatched_vector_length() {
        let model = one_component_model(0.0);
        let bad = DVector::from_vec(vec![1.0, 2.0]);
        assert!(model.compute_coefficients(&bad).is_err());
    }

    #[test]
    fn constructor_rejects_non_orthonormal_basis() {
        let representer = VectorRepresenter::new(2);
        let mean = DVector::zeros(2);
        let basis = DMatrix::from_vec(2, 2, vec![1.0, 0.0, 1.0, 0.0]);
        let variance = DVector::from_vec(vec![2.0, 1.0]);
        let result = StatisticalModel::new(representer, mean, basis, variance, 0.0, ModelInfo::empty());
        assert!(result.is_err());
    }

    #[test]
    fn constructor_rejects_unsorted_variance() {
        let representer = VectorRepresenter::new(2);
        let mean = DVector::zeros(2);
        let basis = DMatrix::identity(2, 2);
        let variance = DVector::from_vec(vec![1.0, 2.0]);
        let result = StatisticalModel::new(representer, mean, basis, variance, 0.0, ModelInfo::empty());
        assert!(result.is_err());
    }
}
