//! End-to-end scenarios driving the full fit -> condition -> reduce
//! pipeline through the public API, one test per behavior being checked.

use nalgebra::DVector;

use statismo_core::builders::{PCAModelBuilder, PosteriorModelBuilder, ReducedVarianceModelBuilder};
use statismo_core::constraints::PointValueWithCovariance;
use statismo_core::data::DataManager;
use statismo_core::model::StatisticalModel;
use statismo_core::model_info::ModelInfo;
use statismo_core::representer::VectorRepresenter;

fn manager_with(samples: &[Vec<f64>]) -> DataManager<VectorRepresenter> {
    let dim = samples[0].len();
    let mut dm = DataManager::new(VectorRepresenter::new(dim));
    for (i, s) in samples.iter().enumerate() {
        dm.add_dataset(s, format!("sample-{i}")).unwrap();
    }
    dm
}

#[test]
fn pca_fit_recovers_known_mean_and_variance_on_collinear_samples() {
    let dm = manager_with(&[vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0], vec![3.0, 4.0, 5.0]]);
    let model = PCAModelBuilder::default().build_new_model(&dm, 0.0).unwrap();

    assert_eq!(model.num_components(), 1);
    for (got, expected) in model.mean_vector().iter().zip([2.0, 3.0, 4.0]) {
        assert!((got - expected).abs() < 1e-8);
    }
    assert!((model.pca_variance()[0] - 3.0).abs() < 1e-6);

    let basis = model.orthonormal_pca_basis_matrix();
    let expected_direction = 1.0 / 3.0_f64.sqrt();
    for v in basis.column(0).iter() {
        assert!((v.abs() - expected_direction).abs() < 1e-6);
    }
}

#[test]
fn posterior_collapses_near_the_observed_point() {
    let representer = VectorRepresenter::new(2);
    let mean = DVector::from_vec(vec![0.0, 0.0]);
    let basis = nalgebra::DMatrix::identity(2, 2);
    let variance = DVector::from_vec(vec![1.0, 1.0]);
    let prior =
        StatisticalModel::new(representer, mean, basis, variance, 0.0, ModelInfo::empty()).unwrap();

    let tiny = 1e-8;
    let constraints = vec![
        PointValueWithCovariance::new(0usize, vec![2.0], nalgebra::DMatrix::from_vec(1, 1, vec![tiny])),
        PointValueWithCovariance::new(1usize, vec![-1.0], nalgebra::DMatrix::from_vec(1, 1, vec![tiny])),
    ];

    let posterior = PosteriorModelBuilder::new()
        .build_new_model_from_model(&prior, &constraints)
        .unwrap();

    assert!((posterior.mean_vector()[0] - 2.0).abs() < 1e-3);
    assert!((posterior.mean_vector()[1] - (-1.0)).abs() < 1e-3);
}

#[test]
fn reduced_variance_keeps_leading_components_to_cross_threshold() {
    let representer = VectorRepresenter::new(3);
    let mean = DVector::zeros(3);
    let basis = nalgebra::DMatrix::identity(3, 3);
    let variance = DVector::from_vec(vec![4.0, 2.0, 1.0]);
    let model =
        StatisticalModel::new(representer, mean, basis, variance, 0.0, ModelInfo::empty()).unwrap();

    let reduced = ReducedVarianceModelBuilder::new()
        .build_new_model_with_variance(&model, 0.85)
        .unwrap();

    assert_eq!(reduced.num_components(), 2);
    assert!((reduced.pca_variance()[0] - 4.0).abs() < 1e-12);
    assert!((reduced.pca_variance()[1] - 2.0).abs() < 1e-12);
}

#[test]
fn mahalanobis_distance_vanishes_at_the_mean() {
    let dm = manager_with(&[vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0], vec![3.0, 4.0, 5.0]]);
    let model = PCAModelBuilder::default().build_new_model(&dm, 0.0).unwrap();

    let distance = model.compute_mahalanobis_distance(&model.draw_mean()).unwrap();
    assert!(distance.abs() < 1e-8);
}

#[test]
fn coefficients_scale_down_under_observation_noise() {
    let representer = VectorRepresenter::new(1);
    let mean = DVector::from_vec(vec![0.0]);
    let basis = nalgebra::DMatrix::from_vec(1, 1, vec![1.0]);
    let variance = DVector::from_vec(vec![1.0]);
    let model =
        StatisticalModel::new(representer, mean, basis, variance, 0.25, ModelInfo::empty()).unwrap();

    let x = DVector::from_vec(vec![2.0]);
    let alpha = model.compute_coefficients(&x).unwrap();
    assert!((alpha[0] - 1.6).abs() < 1e-8);
}

#[test]
fn cross_validation_partitions_cover_the_dataset_exactly_once() {
    let mut dm = DataManager::new(VectorRepresenter::new(1));
    for i in 0..10 {
        dm.add_dataset(&vec![i as f64], format!("sample-{i}")).unwrap();
    }

    let folds = dm.cross_validation_folds(3, false, None).unwrap();
    let mut sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(sizes, vec![4, 3, 3]);

    let mut train_sizes: Vec<usize> = folds.iter().map(|f| f.train.len()).collect();
    train_sizes.sort_unstable();
    assert_eq!(train_sizes, vec![6, 7, 7]);

    let mut covered: Vec<&str> = folds
        .iter()
        .flat_map(|f| f.test.iter().map(|i| i.uri.as_str()))
        .collect();
    covered.sort_unstable();
    let expected: Vec<String> = (0..10).map(|i| format!("sample-{i}")).collect();
    assert_eq!(covered, expected.iter().map(|s| s.as_str()).collect::<Vec<_>>());
}
