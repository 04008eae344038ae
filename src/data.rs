//! `DataItem` / `DataManager`: training samples as (URI, sample-vector)
//! pairs, partitioned into cross-validation folds.

use nalgebra::DVector;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{StatismoError, StatismoResult};
use crate::representer::Representer;

/// A single training sample: its origin URI and its lifted sample vector.
#[derive(Debug, Clone)]
pub struct DataItem {
    pub uri: String,
    pub sample: DVector<f64>,
}

impl DataItem {
    pub fn new(uri: impl Into<String>, sample: DVector<f64>) -> Self {
        Self {
            uri: uri.into(),
            sample,
        }
    }
}

/// A train/test partition produced by cross-validation.
#[derive(Debug, Clone)]
pub struct Fold {
    pub train: Vec<DataItem>,
    pub test: Vec<DataItem>,
}

/// Owns a set of `DataItem`s, all lifted through the same representer.
pub struct DataManager<R: Representer> {
    representer: R,
    items: Vec<DataItem>,
}

impl<R: Representer> DataManager<R> {
    pub fn new(representer: R) -> Self {
        Self {
            representer,
            items: Vec::new(),
        }
    }

    pub fn representer(&self) -> &R {
        &self.representer
    }

    /// Lifts `object` through the representer and stores it as a `DataItem`.
    pub fn add_dataset(&mut self, object: &R::Sample, uri: impl Into<String>) -> StatismoResult<()> {
        let sample = self.representer.sample_to_vector(object)?;
        let uri = uri.into();
        debug!(uri = %uri, length = sample.len(), "Added dataset to DataManager");
        self.items.push(DataItem::new(uri, sample));
        Ok(())
    }

    pub fn data(&self) -> &[DataItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Splits the dataset into `n_folds` (training, testing) partitions.
    ///
    /// Testing partitions collectively cover the full dataset exactly once;
    /// when `n_folds` does not evenly divide the item count, the remainder
    /// is distributed round-robin to the first folds. Without `seed`,
    /// `randomize` still shuffles deterministically (seed 0) so results are
    /// reproducible run to run.
    pub fn cross_validation_folds(
        &self,
        n_folds: usize,
        randomize: bool,
        seed: Option<u64>,
    ) -> StatismoResult<Vec<Fold>> {
        if n_folds == 0 {
            return Err(StatismoError::bad_input("n_folds must be at least 1"));
        }
        if n_folds > self.items.len() {
            return Err(StatismoError::bad_input(format!(
                "n_folds ({}) exceeds dataset size ({})",
                n_folds,
                self.items.len()
            )));
        }

        let mut order: Vec<usize> = (0..self.items.len()).collect();
        if randomize {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or(0));
            order.shuffle(&mut rng);
        }

        let n = order.len();
        let base = n / n_folds;
        let remainder = n % n_folds;

        let mut folds = Vec::with_capacity(n_folds);
        let mut cursor = 0;
        for fold_idx in 0..n_folds {
            let size = base + usize::from(fold_idx < remainder);
            let test_indices = &order[cursor..cursor + size];
            cursor += size;

            let test: Vec<DataItem> = test_indices.iter().map(|&i| self.items[i].clone()).collect();
            let train: Vec<DataItem> = order
                .iter()
                .filter(|i| !test_indices.contains(i))
                .map(|&i| self.items[i].clone())
                .collect();

            folds.push(Fold { train, test });
        }

        debug!(n_folds, randomize, "Computed cross-validation folds");

        Ok(folds)
    }

    /// `n` folds of size 1, one held-out item each.
    pub fn leave_one_out_folds(&self) -> Vec<Fold> {
        (0..self.items.len())
            .map(|held_out| {
                let test = vec![self.items[held_out].clone()];
                let train = self
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != held_out)
                    .map(|(_, item)| item.clone())
                    .collect();
                Fold { train, test }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representer::VectorRepresenter;

    fn manager_with(n: usize) -> DataManager<VectorRepresenter> {
        let mut dm = DataManager::new(VectorRepresenter::new(1));
        for i in 0..n {
            dm.add_dataset(&vec![i as f64], format!("sample-{i}")).unwrap();
        }
        dm
    }

    #[test]
    fn cross_validation_fold_sizes_match_uneven_split() {
        let dm = manager_with(10);
        let folds = dm.cross_validation_folds(3, false, None).unwrap();

        let mut sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut train_sizes: Vec<usize> = folds.iter().map(|f| f.train.len()).collect();
        train_sizes.sort_unstable();
        assert_eq!(train_sizes, vec![6, 7, 7]);
    }

    #[test]
    fn test_partitions_cover_dataset_exactly_once() {
        let dm = manager_with(10);
        let folds = dm.cross_validation_folds(3, false, None).unwrap();

        let mut all_uris: Vec<&str> = folds
            .iter()
            .flat_map(|f| f.test.iter().map(|i| i.uri.as_str()))
            .collect();
        all_uris.sort_unstable();

        let expected: Vec<String> = (0..10).map(|i| format!("sample-{i}")).collect();
        assert_eq!(all_uris, expected.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn leave_one_out_produces_n_folds_of_size_one() {
        let dm = manager_with(5);
        let folds = dm.leave_one_out_folds();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.test.len(), 1);
            assert_eq!(fold.train.len(), 4);
        }
    }

    #[test]
    fn randomized_folds_are_deterministic_without_explicit_seed() {
        let dm = manager_with(10);
        let a = dm.cross_validation_folds(3, true, None).unwrap();
        let b = dm.cross_validation_folds(3, true, None).unwrap();

        let a_uris: Vec<&str> = a[0].test.iter().map(|i| i.uri.as_str()).collect();
        let b_uris: Vec<&str> = b[0].test.iter().map(|i| i.uri.as_str()).collect();
        assert_eq!(a_uris, b_uris);
    }

    #[test]
    fn rejects_zero_folds() {
        let dm = manager_with(5);
        assert!(dm.cross_validation_folds(0, false, None).is_err());
    }
}
