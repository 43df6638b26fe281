use crate::basis::CoxDeBoorScratch;
use crate::builder::BuildError;
use crate::data::SampleTable;
use crate::linalg::{self, LinalgError};
use crate::spline::Spline;
use faer::sparse::{SparseColMat, Triplet};
use ndarray::Array1;

/// The design matrix B: row i holds the tensor-product basis evaluated
/// at sample i. At most prod(p_j + 1) non-zeros per row.
pub(crate) fn basis_matrix(
    spline: &Spline,
    table: &SampleTable,
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    let num_samples = table.num_samples();
    let num_cols = spline.num_coefficients();
    let support: usize = spline.degrees().iter().map(|&p| p + 1).product();
    let max_degree = spline.degrees().iter().copied().max().unwrap_or(0);

    let mut scratch = CoxDeBoorScratch::new(max_degree);
    let mut triplets = Vec::with_capacity(num_samples.saturating_mul(support));
    for (row, sample) in table.samples().iter().enumerate() {
        let basis_row = spline.basis_row(sample.x(), &mut scratch);
        for (&col, &value) in basis_row.cols().iter().zip(basis_row.values().iter()) {
            triplets.push(Triplet::new(row, col, value));
        }
    }

    linalg::sparse_from_triplets(num_samples, num_cols, &triplets)
}

/// The diagonal of the weight matrix W: the identity when no weights
/// were supplied, else the per-sample weights.
pub(crate) fn weight_diagonal(num_samples: usize, weights: &[f64]) -> Array1<f64> {
    if weights.is_empty() {
        Array1::ones(num_samples)
    } else {
        Array1::from(weights.to_vec())
    }
}

/// Second-order finite-difference operator over the coefficient tensor,
/// penalizing curvature along every axis.
///
/// With the per-axis basis counts reversed (the coefficient layout has
/// the last axis fastest), each axis contributes a block of
/// `rightProd * leftProd * (n_a - 2)` rows sweeping a (+1, -2, +1)
/// stencil at stride `leftProd` through every slice of the tensor. The
/// row ordering is part of the operator's contract.
pub(crate) fn second_order_difference_matrix(
    num_basis_per_axis: &[usize],
) -> Result<SparseColMat<usize, f64>, BuildError> {
    for (axis, &count) in num_basis_per_axis.iter().enumerate() {
        if count < 3 {
            return Err(BuildError::PenaltyNeedsThreeBasis { axis, found: count });
        }
    }

    let num_cols: usize = num_basis_per_axis.iter().product();
    let mut dims: Vec<usize> = num_basis_per_axis.to_vec();
    dims.reverse();

    let mut triplets = Vec::new();
    let mut row = 0usize;
    for a in 0..dims.len() {
        let left_prod: usize = dims[..a].iter().product();
        let right_prod: usize = dims[a + 1..].iter().product();
        for j in 0..right_prod {
            let base = j * left_prod * dims[a];
            for l in 0..dims[a] - 2 {
                for offset in 0..left_prod {
                    let col = base + l * left_prod + offset;
                    triplets.push(Triplet::new(row, col, 1.0));
                    triplets.push(Triplet::new(row, col + left_prod, -2.0));
                    triplets.push(Triplet::new(row, col + 2 * left_prod, 1.0));
                    row += 1;
                }
            }
        }
    }

    linalg::sparse_from_triplets(row, num_cols, &triplets).map_err(BuildError::from)
}

/// Triplets of the weighted gram matrix M'WM, built from a row sweep of
/// the CSR form; duplicate entries are summed on construction.
pub(crate) fn weighted_gram_triplets(
    matrix: &SparseColMat<usize, f64>,
    weights: Option<&Array1<f64>>,
) -> Result<Vec<Triplet<usize, usize, f64>>, LinalgError> {
    let rows = linalg::to_row_major(matrix)?;
    let symbolic = rows.symbolic();
    let row_ptr = symbolic.row_ptr();
    let col_idx = symbolic.col_idx();
    let values = rows.val();

    let mut triplets = Vec::new();
    for row in 0..rows.nrows() {
        let weight = weights.map_or(1.0, |w| w[row]);
        let start = row_ptr[row];
        let end = row_ptr[row + 1];
        for left in start..end {
            for right in start..end {
                triplets.push(Triplet::new(
                    col_idx[left],
                    col_idx[right],
                    weight * values[left] * values[right],
                ));
            }
        }
    }
    Ok(triplets)
}

/// M'Wy via a column sweep of the CSC storage.
pub(crate) fn weighted_rhs(
    matrix: &SparseColMat<usize, f64>,
    weights: Option<&Array1<f64>>,
    y: &Array1<f64>,
) -> Array1<f64> {
    let (symbolic, values) = matrix.parts();
    let col_ptr = symbolic.col_ptr();
    let row_idx = symbolic.row_idx();

    let mut out = Array1::<f64>::zeros(matrix.ncols());
    for col in 0..matrix.ncols() {
        let mut acc = 0.0;
        for idx in col_ptr[col]..col_ptr[col + 1] {
            let row = row_idx[idx];
            let weight = weights.map_or(1.0, |w| w[row]);
            acc += values[idx] * weight * y[row];
        }
        out[col] = acc;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knots::{AxisBounds, KnotSpacing, compute_knot_vector};
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn skeleton_1d(values: &[f64], degree: usize) -> Spline {
        let knots = compute_knot_vector(
            0,
            values,
            degree,
            0,
            AxisBounds::data_extent(),
            0.0,
            KnotSpacing::AsSampled,
        )
        .expect("knot construction should succeed");
        Spline::skeleton(vec![knots], vec![degree])
    }

    #[test]
    fn basis_matrix_rows_partition_unity() {
        let mut table = SampleTable::new();
        for x in [0.0, 1.0, 2.0, 3.0, 4.0, 5.0] {
            table.add_sample(&[x], x * x).expect("sample");
        }
        let spline = skeleton_1d(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 3);
        let b = basis_matrix(&spline, &table).expect("assembly should succeed");

        assert_eq!(b.nrows(), 6);
        assert_eq!(b.ncols(), spline.num_coefficients());

        let dense = linalg::sparse_to_dense(&b);
        for row in 0..dense.nrows() {
            let sum: f64 = dense.row(row).sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn difference_matrix_1d_is_the_second_difference_stencil() {
        let d = second_order_difference_matrix(&[5]).expect("valid basis count");
        assert_eq!(d.nrows(), 3);
        assert_eq!(d.ncols(), 5);
        let dense = linalg::sparse_to_dense(&d);
        let expected = array![
            [1.0, -2.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, -2.0, 1.0, 0.0],
            [0.0, 0.0, 1.0, -2.0, 1.0]
        ];
        assert_abs_diff_eq!(
            dense.as_slice().unwrap(),
            expected.as_slice().unwrap(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn difference_matrix_2d_block_structure_and_row_order() {
        // Axis basis counts [3, 4]: the coefficient layout has the
        // second axis fastest, so the first block differences along it
        // at stride 1, and the second block along the first axis at
        // stride 4.
        let d = second_order_difference_matrix(&[3, 4]).expect("valid basis counts");
        assert_eq!(d.nrows(), 3 * 2 + 4);
        assert_eq!(d.ncols(), 12);
        let dense = linalg::sparse_to_dense(&d);

        // First block: rows j*4 + l over the fast axis.
        for j in 0..3 {
            for l in 0..2 {
                let row = j * 2 + l;
                let base = j * 4 + l;
                for col in 0..12 {
                    let expected = match col {
                        c if c == base => 1.0,
                        c if c == base + 1 => -2.0,
                        c if c == base + 2 => 1.0,
                        _ => 0.0,
                    };
                    assert_abs_diff_eq!(dense[[row, col]], expected, epsilon = 1e-14);
                }
            }
        }

        // Second block: a single sub-block sweeping the identity over
        // the fast axis at stride 4.
        for offset in 0..4 {
            let row = 6 + offset;
            for col in 0..12 {
                let expected = match col {
                    c if c == offset => 1.0,
                    c if c == offset + 4 => -2.0,
                    c if c == offset + 8 => 1.0,
                    _ => 0.0,
                };
                assert_abs_diff_eq!(dense[[row, col]], expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn difference_matrix_requires_three_basis_functions() {
        match second_order_difference_matrix(&[4, 2]) {
            Err(BuildError::PenaltyNeedsThreeBasis { axis, found }) => {
                assert_eq!(axis, 1);
                assert_eq!(found, 2);
            }
            other => panic!("Expected PenaltyNeedsThreeBasis, got {other:?}"),
        }
    }

    #[test]
    fn weighted_gram_matches_dense_computation() {
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(0, 1, 2.0),
            Triplet::new(1, 1, -1.0),
            Triplet::new(1, 2, 0.5),
            Triplet::new(2, 0, 3.0),
            Triplet::new(2, 2, 1.5),
        ];
        let m = linalg::sparse_from_triplets(3, 3, &triplets).expect("valid triplets");
        let w = array![2.0, 1.0, 0.5];

        let gram_triplets = weighted_gram_triplets(&m, Some(&w)).expect("gram assembly");
        let gram = linalg::sparse_from_triplets(3, 3, &gram_triplets).expect("gram matrix");
        let gram_dense = linalg::sparse_to_dense(&gram);

        let dense = linalg::sparse_to_dense(&m);
        let mut weighted = Array2::<f64>::zeros((3, 3));
        for row in 0..3 {
            for col in 0..3 {
                weighted[[row, col]] = dense[[row, col]] * w[row];
            }
        }
        let expected = dense.t().dot(&weighted);
        assert_abs_diff_eq!(
            gram_dense.as_slice().unwrap(),
            expected.as_slice().unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn weighted_rhs_matches_dense_computation() {
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(0, 1, 2.0),
            Triplet::new(1, 0, -1.0),
            Triplet::new(2, 1, 4.0),
        ];
        let m = linalg::sparse_from_triplets(3, 2, &triplets).expect("valid triplets");
        let w = array![1.0, 2.0, 0.25];
        let y = array![1.0, -1.0, 2.0];

        let rhs = weighted_rhs(&m, Some(&w), &y);
        let dense = linalg::sparse_to_dense(&m);
        let weighted_y = array![1.0 * 1.0, 2.0 * -1.0, 0.25 * 2.0];
        let expected = dense.t().dot(&weighted_y);
        assert_abs_diff_eq!(
            rhs.as_slice().unwrap(),
            expected.as_slice().unwrap(),
            epsilon = 1e-13
        );
    }

    #[test]
    fn weight_diagonal_defaults_to_identity() {
        let ones = weight_diagonal(4, &[]);
        assert_eq!(ones.len(), 4);
        assert!(ones.iter().all(|&w| w == 1.0));

        let custom = weight_diagonal(3, &[0.5, 2.0, 1.0]);
        assert_abs_diff_eq!(custom[1], 2.0, epsilon = 1e-15);
    }
}
