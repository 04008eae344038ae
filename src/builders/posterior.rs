//! `PosteriorModelBuilder`: conditions a `StatisticalModel` on a set of known
//! point values, producing a tighter posterior model over the same domain.

use nalgebra::{DMatrix, DVector};

use crate::constraints::{trivial_uniform, PointValue, PointValueWithCovariance};
use crate::data::DataManager;
use crate::error::{StatismoError, StatismoResult};
use crate::linalg;
use crate::model::StatisticalModel;
use crate::model_info::BuilderInfo;
use crate::builders::pca::PCAModelBuilder;
use crate::representer::Representer;

pub struct PosteriorModelBuilder;

impl Default for PosteriorModelBuilder {
    fn default() -> Self {
        Self
    }
}

impl PosteriorModelBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Fits a PCA prior from `data`, then conditions it on `constraints`
    /// observed with the given per-point covariances.
    pub fn build_new_model<R: Representer + Clone>(
        &self,
        data: &DataManager<R>,
        constraints: &[PointValueWithCovariance<R::Point>],
        pca_noise_variance: f64,
    ) -> StatismoResult<StatisticalModel<R>> {
        let prior = PCAModelBuilder::default().build_new_model(data, pca_noise_variance)?;
        self.build_new_model_from_model(&prior, constraints)
    }

    /// As `build_new_model`, but every constraint shares the same scalar
    /// observation noise variance.
    pub fn build_new_model_with_uniform_noise<R: Representer + Clone>(
        &self,
        data: &DataManager<R>,
        constraints: &[PointValue<R::Point>],
        point_value_noise_variance: f64,
        pca_noise_variance: f64,
    ) -> StatismoResult<StatisticalModel<R>> {
        let dim = data.representer().dimensions();
        let with_cov = trivial_uniform(constraints, point_value_noise_variance, dim);
        self.build_new_model(data, &with_cov, pca_noise_variance)
    }

    /// Conditions an existing model directly, without refitting PCA.
    pub fn build_new_model_from_model<R: Representer + Clone>(
        &self,
        prior: &StatisticalModel<R>,
        constraints: &[PointValueWithCovariance<R::Point>],
    ) -> StatismoResult<StatisticalModel<R>> {
        if constraints.is_empty() {
            tracing::info!("No constraints supplied, posterior equals prior");
            let builder_info = BuilderInfo::new(
                "PosteriorModelBuilder",
                vec![("numberOfConstraints".to_string(), "0".to_string())],
                vec![],
            );
            let model_info = prior.model_info().with_appended(builder_info, None);
            return StatisticalModel::new(
                prior.representer().clone(),
                prior.mean_vector().clone(),
                prior.orthonormal_pca_basis_matrix().clone(),
                prior.pca_variance().clone(),
                prior.noise_variance(),
                model_info,
            );
        }

        let k = prior.num_components();
        if k == 0 {
            return Err(StatismoError::bad_input("prior model has zero components"));
        }
        let d = prior.representer().dimensions();

        let mut rows = Vec::new();
        let mut residual_entries = Vec::new();
        let mut cov_blocks = Vec::new();
        for constraint in constraints {
            if constraint.value.len() != d {
                return Err(StatismoError::bad_input(format!(
                    "constraint value has {} entries, expected {}",
                    constraint.value.len(),
                    d
                )));
            }
            if constraint.covariance.nrows() != d || constraint.covariance.ncols() != d {
                return Err(StatismoError::bad_input(format!(
                    "constraint covariance is {}x{}, expected {}x{}",
                    constraint.covariance.nrows(),
                    constraint.covariance.ncols(),
                    d,
                    d
                )));
            }

            let range = prior.point_row_range(&constraint.point)?;
            let basis = prior.orthonormal_pca_basis_matrix();
            let mean = prior.mean_vector();
            for (offset, row_idx) in range.enumerate() {
                rows.push(basis.row(row_idx).clone_owned());
                residual_entries.push(constraint.value[offset] - mean[row_idx]);
            }
            cov_blocks.push(constraint.covariance.clone());
        }

        let m = rows.len();
        let u_selected = DMatrix::from_rows(&rows);
        let residual = DVector::from_vec(residual_entries);

        let mut sigma_obs = DMatrix::<f64>::zeros(m, m);
        let mut offset = 0;
        for block in &cov_blocks {
            let size = block.nrows();
            sigma_obs.view_mut((offset, offset), (size, size)).copy_from(block);
            offset += size;
        }

        let (beta_mean, posterior_cov) =
            linalg::posterior_coefficients(&u_selected, prior.pca_variance(), &sigma_obs, &residual)?;

        let eigen = linalg::symmetric_eigen(&posterior_cov);
        let kept: usize = eigen.eigenvalues.iter().take_while(|&&v| v > linalg::TOLERANCE).count();
        let kept = kept.max(1).min(k);

        let new_mean = prior.mean_vector() + prior.orthonormal_pca_basis_matrix() * &beta_mean;
        let new_basis = prior.orthonormal_pca_basis_matrix() * eigen.eigenvectors.columns(0, kept);
        let new_variance = eigen.eigenvalues.rows(0, kept).clone_owned();

        let builder_info = BuilderInfo::new(
            "PosteriorModelBuilder",
            vec![("numberOfConstraints".to_string(), constraints.len().to_string())],
            vec![],
        );
        let model_info = prior.model_info().with_appended(builder_info, None);

        tracing::info!(constraints = constraints.len(), components = kept, "Posterior model built");

        StatisticalModel::new(
            prior.representer().clone(),
            new_mean,
            new_basis,
            new_variance,
            prior.noise_variance(),
            model_info,
        )
    }
}
