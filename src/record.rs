//! The logical model record: a flat, serializable snapshot of a
//! `StatisticalModel`, the persistence surface an external I/O layer (HDF5,
//! or here, JSON) reads and writes.

use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StatismoError, StatismoResult};
use crate::model::StatisticalModel;
use crate::model_info::{BuilderInfo, ModelInfo};
use crate::representer::Representer;

const CURRENT_VERSION: &str = "1.0.0";

fn default_version() -> String {
    CURRENT_VERSION.to_string()
}

/// A dense matrix flattened row-major, with its shape carried alongside so
/// it round-trips through JSON without needing `nalgebra`'s own serde
/// support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl FlatMatrix {
    pub fn from_matrix(matrix: &DMatrix<f64>) -> Self {
        let mut data = Vec::with_capacity(matrix.nrows() * matrix.ncols());
        for row in matrix.row_iter() {
            data.extend(row.iter().copied());
        }
        Self {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
            data,
        }
    }

    pub fn to_matrix(&self) -> StatismoResult<DMatrix<f64>> {
        if self.data.len() != self.rows * self.cols {
            return Err(StatismoError::invalid_data(format!(
                "matrix data has {} entries, expected {}x{}",
                self.data.len(),
                self.rows,
                self.cols
            )));
        }
        Ok(DMatrix::from_row_slice(self.rows, self.cols, &self.data))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderInfoRecord {
    pub builder_name: String,
    pub data_info: Vec<(String, String)>,
    pub parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(default = "default_version")]
    pub version: String,

    pub mean: Vec<f64>,
    pub orthonormal_basis: FlatMatrix,
    pub pca_variance: Vec<f64>,
    pub noise_variance: f64,

    #[serde(default)]
    pub scores: Option<FlatMatrix>,

    #[serde(default)]
    pub builder_info: Vec<BuilderInfoRecord>,

    pub representer_identifier: String,
    pub representer_version: String,
}

impl ModelRecord {
    pub fn from_model<R: Representer>(model: &StatisticalModel<R>) -> Self {
        let info = model.model_info();
        Self {
            version: default_version(),
            mean: model.mean_vector().iter().copied().collect(),
            orthonormal_basis: FlatMatrix::from_matrix(model.orthonormal_pca_basis_matrix()),
            pca_variance: model.pca_variance().iter().copied().collect(),
            noise_variance: model.noise_variance(),
            scores: info.scores.as_ref().map(FlatMatrix::from_matrix),
            builder_info: info
                .builder_info
                .iter()
                .map(|b| BuilderInfoRecord {
                    builder_name: b.builder_name.clone(),
                    data_info: b.data_info.clone(),
                    parameters: b.parameters.clone(),
                })
                .collect(),
            representer_identifier: model.representer().identifier().to_string(),
            representer_version: model.representer().version().to_string(),
        }
    }

    /// Reconstructs a `StatisticalModel` from this record, using `representer`
    /// as the live adapter (the record itself only carries its identifying
    /// strings, not enough to reconstruct a representer instance).
    pub fn to_model<R: Representer>(&self, representer: R) -> StatismoResult<StatisticalModel<R>> {
        if self.version != CURRENT_VERSION {
            return Err(StatismoError::bad_version(format!(
                "model record version {} is not supported (expected {})",
                self.version, CURRENT_VERSION
            )));
        }

        let mean = DVector::from_vec(self.mean.clone());
        let basis = self.orthonormal_basis.to_matrix()?;
        let variance = DVector::from_vec(self.pca_variance.clone());
        let scores = self.scores.as_ref().map(|s| s.to_matrix()).transpose()?;
        let builder_info = self
            .builder_info
            .iter()
            .map(|b| BuilderInfo::new(b.builder_name.clone(), b.data_info.clone(), b.parameters.clone()))
            .collect();

        StatisticalModel::new(
            representer,
            mean,
            basis,
            variance,
            self.noise_variance,
            ModelInfo::new(scores, builder_info),
        )
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        info!(path = ?path, "Saving model record to file");

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize model record to JSON")?;

        std::fs::write(path, json).context("Failed to write model record to file")?;

        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        info!(path = ?path, size_bytes = file_size, "Model record saved successfully");

        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!(path = ?path, "Loading model record from file");

        let json = std::fs::read_to_string(path).context("Failed to read model record file")?;

        let record: ModelRecord =
            serde_json::from_str(&json).context("Failed to deserialize model record from JSON")?;

        debug!(
            version = %record.version,
            components = record.pca_variance.len(),
            "Model record loaded successfully"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representer::VectorRepresenter;
    use nalgebra::DMatrix;

    fn sample_model() -> StatisticalModel<VectorRepresenter> {
        let representer = VectorRepresenter::new(2);
        let mean = DVector::from_vec(vec![1.0, 2.0]);
        let basis = DMatrix::identity(2, 2);
        let variance = DVector::from_vec(vec![3.0, 1.0]);
        StatisticalModel::new(representer, mean, basis, variance, 0.1, ModelInfo::empty()).unwrap()
    }

    #[test]
    fn round_trips_through_json() {
        let model = sample_model();
        let record = ModelRecord::from_model(&model);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ModelRecord = serde_json::from_str(&json).unwrap();

        let rebuilt = parsed.to_model(VectorRepresenter::new(2)).unwrap();
        assert_eq!(rebuilt.mean_vector(), model.mean_vector());
        assert_eq!(rebuilt.pca_variance(), model.pca_variance());
        assert_eq!(rebuilt.noise_variance(), model.noise_variance());
    }

    #[test]
    fn rejects_mismatched_version() {
        let model = sample_model();
        let mut record = ModelRecord::from_model(&model);
        record.version = "0.0.1".to_string();
        assert!(record.to_model(VectorRepresenter::new(2)).is_err());
    }

    #[test]
    fn saves_and_loads_round_trip_via_tempfile() {
        let model = sample_model();
        let record = ModelRecord::from_model(&model);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        record.save_to_file(&path).unwrap();

        let loaded = ModelRecord::load_from_file(&path).unwrap();
        assert_eq!(loaded.mean, record.mean);
    }
}
