//! `PCAModelBuilder`: fits a `StatisticalModel` to a set of training samples
//! via PCA, picking the cheaper of two equivalent eigenproblems depending on
//! whether there are more samples than coordinates ("wide") or fewer
//! ("tall").

use nalgebra::{DMatrix, DVector};

use crate::data::DataManager;
use crate::error::{StatismoError, StatismoResult};
use crate::linalg::{self, EigenMethod};
use crate::model::StatisticalModel;
use crate::model_info::{BuilderInfo, ModelInfo};
use crate::representer::Representer;

/// Fits a new `StatisticalModel` from a `DataManager`'s samples.
pub struct PCAModelBuilder {
    method: EigenMethod,
    compute_scores: bool,
}

impl Default for PCAModelBuilder {
    fn default() -> Self {
        Self {
            method: EigenMethod::JacobiSvd,
            compute_scores: true,
        }
    }
}

impl PCAModelBuilder {
    pub fn new(method: EigenMethod, compute_scores: bool) -> Self {
        Self {
            method,
            compute_scores,
        }
    }

    /// Fits a model with the given isotropic noise variance (0 for plain
    /// PCA; positive for a probabilistic-PCA style model, which also
    /// affects which components survive the tolerance test).
    pub fn build_new_model<R: Representer + Clone>(
        &self,
        data: &DataManager<R>,
        noise_variance: f64,
    ) -> StatismoResult<StatisticalModel<R>> {
        let items = data.data();
        let n = items.len();
        if n == 0 {
            return Err(StatismoError::bad_input(
                "PCAModelBuilder requires a non-empty sample set",
            ));
        }
        if noise_variance < 0.0 {
            return Err(StatismoError::bad_input("noise variance must be non-negative"));
        }

        let p = data.representer().vector_length();
        if p == 0 {
            return Err(StatismoError::bad_input("representer reports zero-length samples"));
        }

        tracing::info!(n, p, "Building PCA model");

        let mean = mean_vector(items, p);
        let x0 = centered_matrix(items, &mean, n, p);

        let (basis, variance) = if n == 1 {
            (DMatrix::<f64>::zeros(p, 0), DVector::<f64>::zeros(0))
        } else if n < p {
            self.wide_regime(&x0, n, noise_variance)
        } else {
            self.tall_regime(&x0, n, noise_variance)
        };

        if variance.is_empty() {
            tracing::error!("no component to keep");
            return Err(StatismoError::internal(
                "all the eigenvalues are below the given tolerance, model cannot be built",
            ));
        }

        let scores = if self.compute_scores {
            Some(basis.transpose() * x0.transpose())
        } else {
            None
        };

        let builder_info = BuilderInfo::new(
            "PCAModelBuilder",
            vec![("numberOfSamples".to_string(), n.to_string())],
            vec![("noiseVariance".to_string(), noise_variance.to_string())],
        );
        let model_info = ModelInfo::new(scores, vec![builder_info]);

        tracing::info!(components = variance.len(), "PCA model built");

        StatisticalModel::new(
            data.representer().clone(),
            mean,
            basis,
            variance,
            noise_variance,
            model_info,
        )
    }

    /// `n < p`: eigendecompose the `n x n` Gram matrix and lift eigenvectors
    /// into sample space, rather than forming the `p x p` covariance.
    fn wide_regime(&self, x0: &DMatrix<f64>, n: usize, noise_variance: f64) -> (DMatrix<f64>, DVector<f64>) {
        let gram = (x0 * x0.transpose()) / (n as f64 - 1.0);

        let (values, vectors) = match self.method {
            EigenMethod::SelfAdjointEigen => {
                let eigen = linalg::symmetric_eigen(&gram);
                (eigen.eigenvalues, eigen.eigenvectors)
            }
            EigenMethod::JacobiSvd => {
                let svd = linalg::thin_svd(&gram, true, false);
                (svd.singular_values, svd.u.expect("u requested"))
            }
        };

        let k = linalg::count_components_above_tolerance(&values, noise_variance).min(n - 1);

        let mut basis = DMatrix::<f64>::zeros(x0.ncols(), k);
        for i in 0..k {
            let scale = 1.0 / (values[i].sqrt() * (n as f64 - 1.0).sqrt());
            let col = x0.transpose() * vectors.column(i) * scale;
            basis.set_column(i, &col);
        }

        let pca_variance = values.rows(0, k).clone_owned().map(|v| v - noise_variance);
        (basis, pca_variance)
    }

    /// `n >= p`: eigendecompose the `p x p` covariance directly; its
    /// eigenvectors are already the orthonormal basis, no further scaling
    /// needed.
    fn tall_regime(&self, x0: &DMatrix<f64>, n: usize, noise_variance: f64) -> (DMatrix<f64>, DVector<f64>) {
        let gram = x0.transpose() * x0;

        let (eigenvalues, eigenvectors) = match self.method {
            EigenMethod::SelfAdjointEigen => {
                let eigen = linalg::symmetric_eigen(&gram);
                (eigen.eigenvalues, eigen.eigenvectors)
            }
            EigenMethod::JacobiSvd => {
                let svd = linalg::thin_svd(&gram, true, false);
                (svd.singular_values, svd.u.expect("u requested"))
            }
        };

        let variance = eigenvalues / (n as f64 - 1.0);
        let k = linalg::count_components_above_tolerance(&variance, noise_variance).min(n - 1);

        let basis = eigenvectors.columns(0, k).clone_owned();
        let pca_variance = variance.rows(0, k).clone_owned().map(|v| v - noise_variance);
        (basis, pca_variance)
    }
}

fn mean_vector(items: &[crate::data::DataItem], p: usize) -> DVector<f64> {
    let mut mean = DVector::<f64>::zeros(p);
    for item in items {
        mean += &item.sample;
    }
    mean / items.len() as f64
}

fn centered_matrix(
    items: &[crate::data::DataItem],
    mean: &DVector<f64>,
    n: usize,
    p: usize,
) -> DMatrix<f64> {
    DMatrix::from_fn(n, p, |i, j| items[i].sample[j] - mean[j])
}
