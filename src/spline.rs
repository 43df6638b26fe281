use crate::basis::{CoxDeBoorScratch, SparseBasisRow, tensor_basis_row};
use ndarray::{Array1, ArrayView1};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Query point has {found} coordinates but the spline has {expected} variables.")]
    DimensionMismatch { expected: usize, found: usize },
}

/// An immutable tensor-product B-spline: per-axis knot vectors and
/// degrees plus a flat coefficient vector.
///
/// Coefficients are stored lexicographically over the basis multi-index
/// with the last axis varying fastest. Safe to share across threads
/// once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Spline {
    knots: Vec<Array1<f64>>,
    degrees: Vec<usize>,
    num_basis: Vec<usize>,
    coefficients: Array1<f64>,
    smoothing_parameter: Option<f64>,
}

impl Spline {
    /// Skeleton spline with zero-initialized coefficients, used while
    /// the regression system is assembled and solved.
    pub(crate) fn skeleton(knots: Vec<Array1<f64>>, degrees: Vec<usize>) -> Self {
        let num_basis: Vec<usize> = knots
            .iter()
            .zip(degrees.iter())
            .map(|(k, &p)| k.len() - p - 1)
            .collect();
        let total: usize = num_basis.iter().product();
        Self {
            knots,
            degrees,
            num_basis,
            coefficients: Array1::zeros(total),
            smoothing_parameter: None,
        }
    }

    pub(crate) fn with_coefficients(
        mut self,
        coefficients: Array1<f64>,
        smoothing_parameter: Option<f64>,
    ) -> Self {
        debug_assert_eq!(coefficients.len(), self.num_coefficients());
        self.coefficients = coefficients;
        self.smoothing_parameter = smoothing_parameter;
        self
    }

    /// Number of variables d.
    pub fn num_variables(&self) -> usize {
        self.degrees.len()
    }

    /// Total number of tensor-product basis functions N.
    pub fn num_coefficients(&self) -> usize {
        self.coefficients.len()
    }

    /// Number of basis functions on each axis.
    pub fn num_basis_functions_per_axis(&self) -> &[usize] {
        &self.num_basis
    }

    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    pub fn knot_vector(&self, axis: usize) -> ArrayView1<'_, f64> {
        self.knots[axis].view()
    }

    /// Read-only view of the flat coefficient vector.
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    /// The regularization weight the fit actually used: the final
    /// lambda after any HFS iterations for P-spline smoothing, alpha
    /// for identity smoothing, `None` for an unregularized fit.
    pub fn smoothing_parameter(&self) -> Option<f64> {
        self.smoothing_parameter
    }

    /// The sparse tensor-product basis row at `x`, of conceptual
    /// length `num_coefficients()`.
    pub fn eval_basis(&self, x: &[f64]) -> Result<SparseBasisRow, EvalError> {
        if x.len() != self.num_variables() {
            return Err(EvalError::DimensionMismatch {
                expected: self.num_variables(),
                found: x.len(),
            });
        }
        let max_degree = self.degrees.iter().copied().max().unwrap_or(0);
        let mut scratch = CoxDeBoorScratch::new(max_degree);
        Ok(self.basis_row(x, &mut scratch))
    }

    /// Basis row with a caller-provided scratch buffer, for assembly
    /// loops that evaluate many points.
    pub(crate) fn basis_row(&self, x: &[f64], scratch: &mut CoxDeBoorScratch) -> SparseBasisRow {
        debug_assert_eq!(x.len(), self.num_variables());
        tensor_basis_row(x, &self.knots, &self.degrees, scratch)
    }

    /// Spline value at `x`. Coordinates outside the knot range are
    /// clamped to the boundary.
    pub fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        let row = self.eval_basis(x)?;
        Ok(row.dot(&self.coefficients))
    }
}
