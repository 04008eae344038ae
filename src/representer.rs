//! The `Representer` contract: the capability every higher component
//! consumes but never implements concretely, except for the one minimal,
//! dependency-free representer supplied for the CLI and tests.

use nalgebra::DVector;

use crate::domain::Domain;
use crate::error::{StatismoError, StatismoResult};

/// Adapter that lifts an application object (mesh, image, ...) into a flat
/// sample vector of length `num_points() * dimensions()` and back.
///
/// Implementors are expected to be cheap to clone-share (`Arc`) and to
/// outlive every `StatisticalModel` built against them — the core never
/// enforces that lifetime itself, it is a documented precondition.
pub trait Representer: std::fmt::Debug {
    type Point: Clone + PartialEq;
    type Sample;

    fn dimensions(&self) -> usize;
    fn num_points(&self) -> usize;
    fn domain(&self) -> &[Self::Point];
    fn point_to_index(&self, point: &Self::Point) -> StatismoResult<usize>;
    fn sample_to_vector(&self, sample: &Self::Sample) -> StatismoResult<DVector<f64>>;
    fn vector_to_sample(&self, vector: &DVector<f64>) -> StatismoResult<Self::Sample>;
    fn identifier(&self) -> &str;
    fn version(&self) -> &str;

    /// `p = num_points * dimensions`, the length of every sample vector.
    fn vector_length(&self) -> usize {
        self.num_points() * self.dimensions()
    }
}

/// Minimal representer over raw `f64` vectors: each domain point is its own
/// scalar coordinate index (`dimensions() == 1`). Supplementary — real
/// representers (mesh, image, polydata) are external collaborators — this
/// one exists only so the library and its tests have a concrete representer
/// that does not pull in rendering or I/O dependencies.
#[derive(Debug, Clone)]
pub struct VectorRepresenter {
    num_points: usize,
    domain: Domain<usize>,
}

impl VectorRepresenter {
    pub fn new(num_points: usize) -> Self {
        Self {
            num_points,
            domain: Domain::new((0..num_points).collect()),
        }
    }
}

impl Representer for VectorRepresenter {
    type Point = usize;
    type Sample = Vec<f64>;

    fn dimensions(&self) -> usize {
        1
    }

    fn num_points(&self) -> usize {
        self.num_points
    }

    fn domain(&self) -> &[Self::Point] {
        self.domain.as_slice()
    }

    fn point_to_index(&self, point: &Self::Point) -> StatismoResult<usize> {
        if *point >= self.num_points {
            return Err(StatismoError::out_of_range(format!(
                "point index {} out of range (num_points = {})",
                point, self.num_points
            )));
        }
        Ok(*point)
    }

    fn sample_to_vector(&self, sample: &Self::Sample) -> StatismoResult<DVector<f64>> {
        if sample.len() != self.num_points {
            return Err(StatismoError::bad_input(format!(
                "sample has {} entries, expected {}",
                sample.len(),
                self.num_points
            )));
        }
        Ok(DVector::from_row_slice(sample))
    }

    fn vector_to_sample(&self, vector: &DVector<f64>) -> StatismoResult<Self::Sample> {
        if vector.len() != self.num_points {
            return Err(StatismoError::bad_input(format!(
                "vector has {} entries, expected {}",
                vector.len(),
                self.num_points
            )));
        }
        Ok(vector.iter().copied().collect())
    }

    fn identifier(&self) -> &str {
        "VectorRepresenter"
    }

    fn version(&self) -> &str {
        "1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sample_vectors() {
        let rep = VectorRepresenter::new(3);
        let sample = vec![1.0, 2.0, 3.0];
        let v = rep.sample_to_vector(&sample).unwrap();
        assert_eq!(v.len(), 3);
        let back = rep.vector_to_sample(&v).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn rejects_out_of_range_point() {
        let rep = VectorRepresenter::new(3);
        assert!(rep.point_to_index(&5).is_err());
        assert!(rep.point_to_index(&2).is_ok());
    }

    #[test]
    fn rejects_mismatched_vector_length() {
        let rep = VectorRepresenter::new(3);
        assert!(rep.sample_to_vector(&vec![1.0, 2.0]).is_err());
    }
}
