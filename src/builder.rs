use crate::data::SampleTable;
use crate::knots::{self, AxisBounds, KnotSpacing};
use crate::linalg::LinalgError;
use crate::solver::{self, SolveSettings};
use crate::spline::Spline;
use thiserror::Error;

/// Highest supported B-spline degree per axis.
pub const MAX_DEGREE: usize = 5;

/// A comprehensive error type for spline construction and the
/// validation of builder configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Only degrees in the range 0..={MAX_DEGREE} are supported, got {0}.")]
    InvalidDegree(usize),

    #[error("Expected one degree per variable ({expected}), got {found}.")]
    DegreeCountMismatch { expected: usize, found: usize },

    #[error("Expected one basis-function count per variable ({expected}), got {found}.")]
    BasisCountMismatch { expected: usize, found: usize },

    #[error("Weight vector length {found} does not match the number of samples ({expected}).")]
    WeightCountMismatch { expected: usize, found: usize },

    #[error("Expected either no bounds or one per variable ({expected}), got {found}.")]
    BoundsCountMismatch { expected: usize, found: usize },

    #[error("Regularization weight alpha must be non-negative, got {0}.")]
    NegativeAlpha(f64),

    #[error("Knot padding must be non-negative, got {0}.")]
    NegativePadding(f64),

    #[error("Cannot build a B-spline from an empty sample table.")]
    EmptyTable,

    #[error("Cannot build a B-spline from an irregular (incomplete) sample grid.")]
    IncompleteGrid,

    #[error(
        "Axis {axis} has only {unique} unique sample values; a degree-{degree} basis requires at least {required}."
    )]
    InsufficientUniqueValues {
        axis: usize,
        unique: usize,
        degree: usize,
        required: usize,
    },

    #[error(
        "The second-order difference penalty requires at least three basis functions per axis; axis {axis} has {found}."
    )]
    PenaltyNeedsThreeBasis { axis: usize, found: usize },

    #[error("Failed to solve for the B-spline coefficients.")]
    SolverFailure,

    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

/// Regularization added to the least-squares objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    /// Plain least squares; interpolation when the system is square.
    #[default]
    None,
    /// Ridge term alpha * c'c (Tikhonov with the identity).
    Identity,
    /// Second-order difference penalty lambda * ||Dc||^2 (P-spline).
    PSpline,
}

/// Accumulates fit configuration over a captured snapshot of the
/// sample table, validates it, and orchestrates knot construction,
/// system assembly, and the regularized solve.
///
/// Setters consume and return the builder so configurations chain;
/// each validates its argument synchronously. `build()` is pure with
/// respect to the captured samples and configuration and can be called
/// repeatedly.
#[derive(Debug, Clone)]
pub struct Builder {
    data: SampleTable,
    degrees: Vec<usize>,
    num_basis_functions: Vec<usize>,
    knot_spacing: KnotSpacing,
    smoothing: Smoothing,
    alpha: f64,
    padding: f64,
    weights: Vec<f64>,
    bounds: Vec<AxisBounds>,
    hfs_iters: usize,
}

impl Builder {
    pub fn new(data: &SampleTable) -> Self {
        let num_variables = data.num_variables();
        Self {
            data: data.clone(),
            degrees: vec![3; num_variables],
            num_basis_functions: vec![0; num_variables],
            knot_spacing: KnotSpacing::default(),
            smoothing: Smoothing::default(),
            alpha: 0.1,
            padding: 0.0,
            weights: Vec::new(),
            bounds: Vec::new(),
            hfs_iters: 0,
        }
    }

    /// The same degree on every axis.
    pub fn degree(self, degree: usize) -> Result<Self, BuildError> {
        if degree > MAX_DEGREE {
            return Err(BuildError::InvalidDegree(degree));
        }
        let num_variables = self.data.num_variables();
        self.degrees_per_axis(vec![degree; num_variables])
    }

    /// One degree per axis.
    pub fn degrees_per_axis(mut self, degrees: Vec<usize>) -> Result<Self, BuildError> {
        if degrees.len() != self.data.num_variables() {
            return Err(BuildError::DegreeCountMismatch {
                expected: self.data.num_variables(),
                found: degrees.len(),
            });
        }
        if let Some(&bad) = degrees.iter().find(|&&p| p > MAX_DEGREE) {
            return Err(BuildError::InvalidDegree(bad));
        }
        self.degrees = degrees;
        Ok(self)
    }

    /// Requested basis-function count per axis; zero derives the count
    /// from the samples. Only the equidistant knot strategy uses it.
    pub fn num_basis_functions(mut self, counts: Vec<usize>) -> Result<Self, BuildError> {
        if counts.len() != self.data.num_variables() {
            return Err(BuildError::BasisCountMismatch {
                expected: self.data.num_variables(),
                found: counts.len(),
            });
        }
        self.num_basis_functions = counts;
        Ok(self)
    }

    pub fn knot_spacing(mut self, spacing: KnotSpacing) -> Self {
        self.knot_spacing = spacing;
        self
    }

    pub fn smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Regularization weight; the initial lambda under P-spline
    /// smoothing when HFS iterations are enabled.
    pub fn alpha(mut self, alpha: f64) -> Result<Self, BuildError> {
        if alpha < 0.0 {
            return Err(BuildError::NegativeAlpha(alpha));
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// Fractional outward padding of the equidistant knot range.
    pub fn padding(mut self, padding: f64) -> Result<Self, BuildError> {
        if padding < 0.0 {
            return Err(BuildError::NegativePadding(padding));
        }
        self.padding = padding;
        Ok(self)
    }

    /// Per-sample weights for P-spline smoothing; an empty vector means
    /// uniform weighting.
    pub fn weights(mut self, weights: Vec<f64>) -> Result<Self, BuildError> {
        if !weights.is_empty() && weights.len() != self.data.num_samples() {
            return Err(BuildError::WeightCountMismatch {
                expected: self.data.num_samples(),
                found: weights.len(),
            });
        }
        self.weights = weights;
        Ok(self)
    }

    /// Per-axis domain overrides for the equidistant knot strategy; an
    /// empty vector keeps the data extent everywhere.
    pub fn bounds(mut self, bounds: Vec<AxisBounds>) -> Result<Self, BuildError> {
        if !bounds.is_empty() && bounds.len() != self.data.num_variables() {
            return Err(BuildError::BoundsCountMismatch {
                expected: self.data.num_variables(),
                found: bounds.len(),
            });
        }
        self.bounds = bounds;
        Ok(self)
    }

    /// Number of Harville-Fellner-Schall iterations used to tune the
    /// P-spline smoothing parameter from its initial alpha.
    pub fn hfs_iters(mut self, iterations: usize) -> Self {
        self.hfs_iters = iterations;
        self
    }

    /// Builds the spline: knot vectors per axis, a skeleton spline,
    /// then coefficients from the regularized least-squares solve.
    pub fn build(&self) -> Result<Spline, BuildError> {
        if self.data.is_empty() {
            return Err(BuildError::EmptyTable);
        }
        if !cfg!(feature = "scattered-data") && !self.data.is_grid_complete() {
            return Err(BuildError::IncompleteGrid);
        }

        let num_variables = self.data.num_variables();
        let mut knot_vectors = Vec::with_capacity(num_variables);
        for axis in 0..num_variables {
            let bounds = self
                .bounds
                .get(axis)
                .copied()
                .unwrap_or_else(AxisBounds::data_extent);
            let values = self.data.axis_values(axis);
            knot_vectors.push(knots::compute_knot_vector(
                axis,
                &values,
                self.degrees[axis],
                self.num_basis_functions[axis],
                bounds,
                self.padding,
                self.knot_spacing,
            )?);
        }

        let skeleton = Spline::skeleton(knot_vectors, self.degrees.clone());
        let settings = SolveSettings {
            smoothing: self.smoothing,
            alpha: self.alpha,
            hfs_iters: self.hfs_iters,
            weights: &self.weights,
        };
        let (coefficients, smoothing_parameter) =
            solver::compute_coefficients(&skeleton, &self.data, &settings)?;
        Ok(skeleton.with_coefficients(coefficients, smoothing_parameter))
    }
}
