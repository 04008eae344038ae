//! Point distribution model algebra: fitting a Gaussian shape model via
//! PCA, conditioning it on known point values, and trimming it back down to
//! its most informative components.

pub mod builders;
pub mod constraints;
pub mod data;
pub mod domain;
pub mod error;
pub mod linalg;
pub mod model;
pub mod model_info;
pub mod record;
pub mod representer;
