use ndarray::Array1;

/// Reusable buffers for the Cox-de Boor recursion, sized for one degree
/// and grown on demand. Reusing them across evaluation points avoids
/// per-point allocation in design-matrix assembly.
#[derive(Clone, Debug)]
pub(crate) struct CoxDeBoorScratch {
    left: Vec<f64>,
    right: Vec<f64>,
    values: Vec<f64>,
}

impl CoxDeBoorScratch {
    pub fn new(degree: usize) -> Self {
        let len = degree + 1;
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
            values: vec![0.0; len],
        }
    }

    #[inline]
    fn ensure_degree(&mut self, degree: usize) {
        let len = degree + 1;
        if self.left.len() < len {
            self.left.resize(len, 0.0);
            self.right.resize(len, 0.0);
            self.values.resize(len, 0.0);
        }
    }
}

/// Evaluates the non-zero B-spline basis values at `t` for a
/// (p+1)-regular knot vector.
///
/// Fills the scratch values with the basis functions supported on the
/// containing knot span and returns the first supported basis index, so
/// the non-zeros sit at global indices `start..=start+degree`. Queries
/// outside the outer knots are clamped to the boundary before
/// evaluation. The knot span is located by bisection over the interior
/// spans, with `t` at or beyond the last knot mapping to the final span.
///
/// Numerically stable iterative form of the recursion (Algorithm A2.2
/// in Piegl & Tiller, "The NURBS Book"); a vanishing denominator
/// contributes zero.
pub(crate) fn eval_basis_support(
    t: f64,
    degree: usize,
    knots: &[f64],
    scratch: &mut CoxDeBoorScratch,
) -> usize {
    let num_knots = knots.len();
    let num_basis = num_knots - degree - 1;

    scratch.ensure_degree(degree);

    let t = t.clamp(knots[0], knots[num_knots - 1]);

    let span = if t >= knots[num_basis] {
        num_basis - 1
    } else {
        // Count interior knots at or below t: knots[span] <= t < knots[span+1].
        degree + knots[degree + 1..num_basis].partition_point(|&k| k <= t)
    };

    let left = &mut scratch.left;
    let right = &mut scratch.right;
    let values = &mut scratch.values;

    values[0] = 1.0;
    for d in 1..=degree {
        left[d] = t - knots[span + 1 - d];
        right[d] = knots[span + d] - t;

        let mut saved = 0.0;
        for r in 0..d {
            let den = right[r + 1] + left[d - r];
            let temp = if den.abs() > 1e-12 {
                values[r] / den
            } else {
                0.0
            };
            values[r] = saved + right[r + 1] * temp;
            saved = left[d - r] * temp;
        }
        values[d] = saved;
    }

    span - degree
}

#[inline]
pub(crate) fn scratch_values(scratch: &CoxDeBoorScratch, degree: usize) -> &[f64] {
    &scratch.values[..=degree]
}

/// A single row of the tensor-product basis: the non-zero entries of a
/// conceptually length-`len` vector, column indices ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBasisRow {
    len: usize,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl SparseBasisRow {
    /// Length of the full (mostly zero) row, i.e. the total number of
    /// tensor-product basis functions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Column indices of the non-zero entries, ascending.
    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    /// Non-zero entries, parallel to `cols`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Inner product with a dense coefficient vector of matching length.
    pub fn dot(&self, coefficients: &Array1<f64>) -> f64 {
        debug_assert_eq!(coefficients.len(), self.len);
        self.cols
            .iter()
            .zip(self.values.iter())
            .map(|(&col, &value)| value * coefficients[col])
            .sum()
    }
}

/// Evaluates the multivariate basis at `x` as the tensor product of the
/// per-axis univariate bases.
///
/// Coefficients are laid out lexicographically over the multi-index
/// with the last axis varying fastest, so each axis folds its support
/// into the accumulated column indices as `col * n_axis + index`. The
/// result has at most prod(p_j + 1) non-zeros.
pub(crate) fn tensor_basis_row(
    x: &[f64],
    knots: &[Array1<f64>],
    degrees: &[usize],
    scratch: &mut CoxDeBoorScratch,
) -> SparseBasisRow {
    let mut cols = vec![0usize];
    let mut values = vec![1.0f64];
    let mut len = 1usize;

    for axis in 0..x.len() {
        let degree = degrees[axis];
        let axis_knots = knots[axis]
            .as_slice()
            .expect("knot vectors are contiguous");
        let num_basis = axis_knots.len() - degree - 1;
        let start = eval_basis_support(x[axis], degree, axis_knots, scratch);
        let axis_values = scratch_values(scratch, degree);

        let mut next_cols = Vec::with_capacity(cols.len() * (degree + 1));
        let mut next_values = Vec::with_capacity(values.len() * (degree + 1));
        for (&col, &value) in cols.iter().zip(values.iter()) {
            for (offset, &axis_value) in axis_values.iter().enumerate() {
                next_cols.push(col * num_basis + start + offset);
                next_values.push(value * axis_value);
            }
        }
        cols = next_cols;
        values = next_values;
        len *= num_basis;
    }

    SparseBasisRow { len, cols, values }
}
