//! `ModelInfo`: immutable provenance record carried by every
//! `StatisticalModel`.

use nalgebra::DMatrix;

/// One builder's contribution to a model's provenance chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderInfo {
    pub builder_name: String,
    pub data_info: Vec<(String, String)>,
    pub parameters: Vec<(String, String)>,
}

impl BuilderInfo {
    pub fn new(
        builder_name: impl Into<String>,
        data_info: Vec<(String, String)>,
        parameters: Vec<(String, String)>,
    ) -> Self {
        Self {
            builder_name: builder_name.into(),
            data_info,
            parameters,
        }
    }
}

/// Immutable record of how a model was produced: an optional score matrix
/// (`k x n`) plus the chain of builders that contributed to it. A model
/// produced from another model inherits the prior's chain and appends its
/// own entry.
#[derive(Debug, Clone, Default)]
pub struct ModelInfo {
    pub scores: Option<DMatrix<f64>>,
    pub builder_info: Vec<BuilderInfo>,
}

impl ModelInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(scores: Option<DMatrix<f64>>, builder_info: Vec<BuilderInfo>) -> Self {
        Self {
            scores,
            builder_info,
        }
    }

    /// Appends one more `BuilderInfo` entry to the provenance chain,
    /// replacing the score matrix with the freshly computed one (or
    /// clearing it, if the new builder didn't compute scores).
    pub fn with_appended(&self, info: BuilderInfo, scores: Option<DMatrix<f64>>) -> Self {
        let mut builder_info = self.builder_info.clone();
        builder_info.push(info);
        Self {
            scores,
            builder_info,
        }
    }
}
