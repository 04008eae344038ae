//! `ReducedVarianceModelBuilder`: trims a model's trailing, least-informative
//! components while leaving its mean, noise variance, and remaining basis
//! columns untouched.

use crate::error::{StatismoError, StatismoResult};
use crate::model::StatisticalModel;
use crate::model_info::BuilderInfo;
use crate::representer::Representer;

pub struct ReducedVarianceModelBuilder;

impl Default for ReducedVarianceModelBuilder {
    fn default() -> Self {
        Self
    }
}

impl ReducedVarianceModelBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Keeps the fewest leading components whose cumulative variance
    /// reaches `total_variance_fraction` of the model's total variance.
    /// Ties resolve conservatively: a fraction that lands exactly on a
    /// component boundary keeps that component.
    pub fn build_new_model_with_variance<R: Representer + Clone>(
        &self,
        model: &StatisticalModel<R>,
        total_variance_fraction: f64,
    ) -> StatismoResult<StatisticalModel<R>> {
        if !(0.0..=1.0).contains(&total_variance_fraction) {
            return Err(StatismoError::bad_input(
                "total_variance_fraction must be in [0, 1]",
            ));
        }

        let variance = model.pca_variance();
        let total: f64 = variance.iter().sum();
        if total <= 0.0 {
            return Err(StatismoError::invalid_data("model has zero total variance"));
        }

        let target = total_variance_fraction * total;
        let mut cumulative = 0.0;
        let mut kept = variance.len();
        for (i, &v) in variance.iter().enumerate() {
            cumulative += v;
            if cumulative >= target - 1e-9 {
                kept = i + 1;
                break;
            }
        }
        kept = kept.max(1);

        self.build_new_model_with_leading_components(model, kept)
    }

    /// Keeps exactly the first `num_components` components.
    pub fn build_new_model_with_number_of_components<R: Representer + Clone>(
        &self,
        model: &StatisticalModel<R>,
        num_components: usize,
    ) -> StatismoResult<StatisticalModel<R>> {
        self.build_new_model_with_leading_components(model, num_components)
    }

    /// Keeps the first `num_components` leading components, which already
    /// carry the most variance since builders emit variance in descending
    /// order.
    pub fn build_new_model_with_leading_components<R: Representer + Clone>(
        &self,
        model: &StatisticalModel<R>,
        num_components: usize,
    ) -> StatismoResult<StatisticalModel<R>> {
        if num_components == 0 || num_components > model.num_components() {
            return Err(StatismoError::bad_input(format!(
                "requested {} components, model has {}",
                num_components,
                model.num_components()
            )));
        }

        let basis = model
            .orthonormal_pca_basis_matrix()
            .columns(0, num_components)
            .clone_owned();
        let variance = model.pca_variance().rows(0, num_components).clone_owned();

        let builder_info = BuilderInfo::new(
            "ReducedVarianceModelBuilder",
            vec![],
            vec![("numberOfComponents".to_string(), num_components.to_string())],
        );
        let model_info = model.model_info().with_appended(builder_info, None);

        tracing::info!(
            from = model.num_components(),
            to = num_components,
            "Reduced model variance"
        );

        StatisticalModel::new(
            model.representer().clone(),
            model.mean_vector().clone(),
            basis,
            variance,
            model.noise_variance(),
            model_info,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representer::VectorRepresenter;
    use nalgebra::{DMatrix, DVector};

    fn three_component_model() -> StatisticalModel<VectorRepresenter> {
        let representer = VectorRepresenter::new(3);
        let mean = DVector::zeros(3);
        let basis = DMatrix::identity(3, 3);
        let variance = DVector::from_vec(vec![6.0, 3.0, 1.0]);
        StatisticalModel::new(
            representer,
            mean,
            basis,
            variance,
            0.0,
            crate::model_info::ModelInfo::empty(),
        )
        .unwrap()
    }

    #[test]
    fn keeps_leading_components_unchanged() {
        let model = three_component_model();
        let reduced = ReducedVarianceModelBuilder::new()
            .build_new_model_with_leading_components(&model, 2)
            .unwrap();

        assert_eq!(reduced.num_components(), 2);
        assert_eq!(reduced.pca_variance()[0], 6.0);
        assert_eq!(reduced.pca_variance()[1], 3.0);
        assert_eq!(reduced.mean_vector(), model.mean_vector());
        assert_eq!(reduced.noise_variance(), model.noise_variance());
    }

    #[test]
    fn variance_fraction_keeps_enough_components_to_cross_threshold() {
        let model = three_component_model();
        // total = 10; 60% threshold = 6, crossed exactly by the first component.
        let reduced = ReducedVarianceModelBuilder::new()
            .build_new_model_with_variance(&model, 0.6)
            .unwrap();
        assert_eq!(reduced.num_components(), 1);

        // 70% threshold requires the second component too.
        let reduced = ReducedVarianceModelBuilder::new()
            .build_new_model_with_variance(&model, 0.7)
            .unwrap();
        assert_eq!(reduced.num_components(), 2);
    }

    #[test]
    fn rejects_zero_components() {
        let model = three_component_model();
        assert!(ReducedVarianceModelBuilder::new()
            .build_new_model_with_number_of_components(&model, 0)
            .is_err());
    }

    #[test]
    fn rejects_more_components_than_available() {
        let model = three_component_model();
        assert!(ReducedVarianceModelBuilder::new()
            .build_new_model_with_number_of_components(&model, 10)
            .is_err());
    }
}
