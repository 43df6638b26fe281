use ndarray::Array1;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Sample has {found} coordinates but the table holds {expected}-dimensional samples.")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Sample must have at least one coordinate.")]
    EmptySample,

    #[error(
        "Column-major block of {num_samples} samples in {num_variables} variables requires {expected} values, got {found}."
    )]
    ColumnBlockSizeMismatch {
        num_samples: usize,
        num_variables: usize,
        expected: usize,
        found: usize,
    },
}

/// A single observation: a point in R^d and its sampled value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    x: Vec<f64>,
    y: f64,
}

impl Sample {
    pub fn new(x: Vec<f64>, y: f64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// Ordered collection of samples with a dimensionality fixed by the first
/// insertion.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    samples: Vec<Sample>,
    num_variables: usize,
}

impl SampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples m.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of variables d. Zero until the first sample is inserted.
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn add_sample(&mut self, x: &[f64], y: f64) -> Result<(), DataError> {
        if x.is_empty() {
            return Err(DataError::EmptySample);
        }
        if self.samples.is_empty() {
            self.num_variables = x.len();
        } else if x.len() != self.num_variables {
            return Err(DataError::DimensionMismatch {
                expected: self.num_variables,
                found: x.len(),
            });
        }
        self.samples.push(Sample::new(x.to_vec(), y));
        Ok(())
    }

    /// Bulk insertion from a flat column-major block of `num_samples` rows in
    /// `num_variables + 1` columns: first all x_0 values, then all x_1, and
    /// so on, with the y column last.
    pub fn add_samples_col_major(
        &mut self,
        data: &[f64],
        num_samples: usize,
        num_variables: usize,
    ) -> Result<(), DataError> {
        let expected = num_samples * (num_variables + 1);
        if data.len() != expected {
            return Err(DataError::ColumnBlockSizeMismatch {
                num_samples,
                num_variables,
                expected,
                found: data.len(),
            });
        }
        let mut x = vec![0.0; num_variables];
        for row in 0..num_samples {
            for (axis, slot) in x.iter_mut().enumerate() {
                *slot = data[axis * num_samples + row];
            }
            let y = data[num_variables * num_samples + row];
            self.add_sample(&x, y)?;
        }
        Ok(())
    }

    /// The values observed on one axis, in insertion order.
    pub fn axis_values(&self, axis: usize) -> Vec<f64> {
        self.samples.iter().map(|s| s.x[axis]).collect()
    }

    /// Sorted distinct values observed on one axis.
    pub fn unique_axis_values(&self, axis: usize) -> Vec<f64> {
        let mut values = self.axis_values(axis);
        values.sort_by(f64::total_cmp);
        values.dedup();
        values
    }

    /// Sampled y-values in insertion order.
    pub fn y_values(&self) -> Array1<f64> {
        Array1::from_iter(self.samples.iter().map(|s| s.y))
    }

    /// True iff the samples form the full Cartesian product of the distinct
    /// per-axis values. An empty table is vacuously complete.
    pub fn is_grid_complete(&self) -> bool {
        if self.samples.is_empty() {
            return true;
        }
        let mut grid_size = 1usize;
        for axis in 0..self.num_variables {
            let count = self.unique_axis_values(axis).len();
            grid_size = match grid_size.checked_mul(count) {
                Some(size) => size,
                None => return false,
            };
        }
        grid_size == self.num_samples()
    }
}
