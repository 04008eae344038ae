//! The three model builders, each producing a fresh `StatisticalModel` and
//! never mutating an existing one.

pub mod pca;
pub mod posterior;
pub mod reduced_variance;

pub use pca::PCAModelBuilder;
pub use posterior::PosteriorModelBuilder;
pub use reduced_variance::ReducedVarianceModelBuilder;
