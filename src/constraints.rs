//! Point-value observation types shared between `StatisticalModel`'s
//! point-constrained queries and `PosteriorModelBuilder`.

use nalgebra::DMatrix;

/// A known value at a domain point, with a single scalar noise variance
/// shared across all such constraints ("uniform-noise" shape).
#[derive(Debug, Clone)]
pub struct PointValue<P> {
    pub point: P,
    pub value: Vec<f64>,
}

impl<P> PointValue<P> {
    pub fn new(point: P, value: Vec<f64>) -> Self {
        Self { point, value }
    }
}

/// A known value at a domain point with its own `d x d` observation
/// covariance ("per-point" shape).
#[derive(Debug, Clone)]
pub struct PointValueWithCovariance<P> {
    pub point: P,
    pub value: Vec<f64>,
    pub covariance: DMatrix<f64>,
}

impl<P> PointValueWithCovariance<P> {
    pub fn new(point: P, value: Vec<f64>, covariance: DMatrix<f64>) -> Self {
        Self {
            point,
            value,
            covariance,
        }
    }
}

/// Observation noise for `StatisticalModel::compute_coefficients_for_point_values`:
/// either one scalar variance shared by every listed point, or one explicit
/// covariance matrix per point.
pub enum NoiseSpec<'a> {
    Uniform(f64),
    PerPoint(&'a [DMatrix<f64>]),
}

/// Maps each `(point, value)` pair to `(point, value, variance * I)`.
pub fn trivial_uniform<P: Clone>(
    constraints: &[PointValue<P>],
    variance: f64,
    dim: usize,
) -> Vec<PointValueWithCovariance<P>> {
    constraints
        .iter()
        .map(|c| {
            PointValueWithCovariance::new(
                c.point.clone(),
                c.value.clone(),
                DMatrix::identity(dim, dim) * variance,
            )
        })
        .collect()
}
