use crate::assembly;
use crate::builder::{BuildError, Smoothing};
use crate::data::SampleTable;
use crate::linalg::{self, StridedView};
use crate::spline::Spline;
use faer::linalg::solvers::Solve;
use faer::prelude::SolveLstsq;
use faer::sparse::{SparseColMat, Triplet};
use ndarray::Array1;

/// Below this many equations the sparse solver is not worth setting up
/// and the system goes straight to dense QR.
const SPARSE_SOLVE_MIN_ROWS: usize = 100;

pub(crate) struct SolveSettings<'a> {
    pub smoothing: Smoothing,
    pub alpha: f64,
    pub hfs_iters: usize,
    pub weights: &'a [f64],
}

/// Computes the coefficient vector for the skeleton spline by solving
///
///   min ||B c - y||^2            (no smoothing)
///   (B'B + alpha*I) c = B'y           (identity / ridge smoothing)
///   (B'WB + lambda*D'D) c = B'Wy       (P-spline smoothing, lambda tuned by HFS)
///
/// Returns the coefficients together with the regularization weight the
/// solve actually used.
pub(crate) fn compute_coefficients(
    spline: &Spline,
    table: &SampleTable,
    settings: &SolveSettings<'_>,
) -> Result<(Array1<f64>, Option<f64>), BuildError> {
    let b = assembly::basis_matrix(spline, table)?;
    let y = table.y_values();
    let n = spline.num_coefficients();

    match settings.smoothing {
        Smoothing::None => {
            let coefficients = solve(&b, &y)?;
            Ok((coefficients, None))
        }
        Smoothing::Identity => {
            let mut triplets = assembly::weighted_gram_triplets(&b, None)?;
            for i in 0..n {
                triplets.push(Triplet::new(i, i, settings.alpha));
            }
            let a = linalg::sparse_from_triplets(n, n, &triplets)?;
            let rhs = assembly::weighted_rhs(&b, None, &y);
            let coefficients = solve(&a, &rhs)?;
            Ok((coefficients, Some(settings.alpha)))
        }
        Smoothing::PSpline => {
            let w = assembly::weight_diagonal(table.num_samples(), settings.weights);
            let d = assembly::second_order_difference_matrix(spline.num_basis_functions_per_axis())?;
            let gram_triplets = assembly::weighted_gram_triplets(&b, Some(&w))?;
            let penalty_triplets = assembly::weighted_gram_triplets(&d, None)?;
            let rhs = assembly::weighted_rhs(&b, Some(&w), &y);

            let mut lambda = settings.alpha;
            if settings.hfs_iters > 0 {
                lambda = tune_smoothing_hfs(
                    &b,
                    &d,
                    &y,
                    &rhs,
                    &gram_triplets,
                    &penalty_triplets,
                    lambda,
                    settings.hfs_iters,
                    table.num_variables(),
                    n,
                )?;
            }

            let a = penalized_system(n, &gram_triplets, &penalty_triplets, lambda)?;
            let coefficients = solve(&a, &rhs)?;
            Ok((coefficients, Some(lambda)))
        }
    }
}

fn penalized_system(
    n: usize,
    gram_triplets: &[Triplet<usize, usize, f64>],
    penalty_triplets: &[Triplet<usize, usize, f64>],
    lambda: f64,
) -> Result<SparseColMat<usize, f64>, BuildError> {
    let mut triplets = Vec::with_capacity(gram_triplets.len() + penalty_triplets.len());
    triplets.extend_from_slice(gram_triplets);
    triplets.extend(
        penalty_triplets
            .iter()
            .map(|t| Triplet::new(t.row, t.col, lambda * t.val)),
    );
    linalg::sparse_from_triplets(n, n, &triplets).map_err(BuildError::from)
}

/// Harville-Fellner-Schall fixed-point iteration for the smoothing
/// parameter (Eilers & Marx, "Practical Smoothing", ch. 3.4).
///
/// Each iteration factors the penalized normal matrix A = B'WB + lambda*D'D
/// with a partial-pivot LU and solves against B'WB and B'Wy, giving the
/// effective dimension ED = trace(A^-1 B'WB) and the current coefficients,
/// from which lambda is updated as sigma^2/tau^2. A degenerate update (tau^2 = 0 or a
/// non-finite or negative ratio) stops the iteration and keeps the last
/// valid lambda.
#[allow(clippy::too_many_arguments)]
fn tune_smoothing_hfs(
    b: &SparseColMat<usize, f64>,
    d: &SparseColMat<usize, f64>,
    y: &Array1<f64>,
    rhs: &Array1<f64>,
    gram_triplets: &[Triplet<usize, usize, f64>],
    penalty_triplets: &[Triplet<usize, usize, f64>],
    mut lambda: f64,
    iterations: usize,
    num_variables: usize,
    n: usize,
) -> Result<f64, BuildError> {
    // The matrix inverse forces dense arithmetic for the whole loop.
    let gram_dense =
        linalg::sparse_to_dense(&linalg::sparse_from_triplets(n, n, gram_triplets)?);
    let penalty_dense =
        linalg::sparse_to_dense(&linalg::sparse_from_triplets(n, n, penalty_triplets)?);
    let num_samples = y.len() as f64;
    let dims = num_variables as f64;

    for iteration in 0..iterations {
        let a_dense = &gram_dense + &(&penalty_dense * lambda);
        let a_view = StridedView::new(&a_dense);
        let lu = a_view.as_mat().partial_piv_lu();

        let gram_view = StridedView::new(&gram_dense);
        let smoother = lu.solve(gram_view.as_mat());
        let mut effective_dim = 0.0;
        for i in 0..n {
            effective_dim += smoother[(i, i)];
        }

        let rhs_view = StridedView::new(rhs);
        let coefficients = linalg::mat_col_to_array(lu.solve(rhs_view.as_mat()).as_ref(), 0);

        let penalized = linalg::sparse_matvec(d, &coefficients);
        let fitted = linalg::sparse_matvec(b, &coefficients);
        let residual = y - &fitted;
        let penalty_norm = penalized.dot(&penalized);
        let residual_norm = residual.dot(&residual);

        #[cfg(feature = "hfs-book-denominators")]
        let (tau_squared, sigma_squared) = (
            penalty_norm / (effective_dim - dims),
            residual_norm / (num_samples - effective_dim),
        );
        #[cfg(not(feature = "hfs-book-denominators"))]
        let (tau_squared, sigma_squared) = (
            penalty_norm / effective_dim,
            residual_norm / (num_samples - dims - effective_dim),
        );

        let updated = sigma_squared / tau_squared;
        if !updated.is_finite() || updated < 0.0 {
            log::warn!(
                "HFS update degenerated at iteration {iteration} \
                 (tau^2 = {tau_squared:.3e}, sigma^2 = {sigma_squared:.3e}); \
                 keeping lambda = {lambda:.6e}"
            );
            break;
        }
        lambda = updated;
        log::debug!(
            "HFS iteration {iteration}: lambda = {lambda:.6e}, ED = {effective_dim:.4}, \
             tau^2 = {tau_squared:.6e}, sigma^2 = {sigma_squared:.6e}"
        );
    }

    Ok(lambda)
}

/// Solves A c = rhs, sparse-first for large square systems with a dense
/// QR least-squares fallback.
fn solve(a: &SparseColMat<usize, f64>, rhs: &Array1<f64>) -> Result<Array1<f64>, BuildError> {
    let num_equations = a.nrows();
    if num_equations >= SPARSE_SOLVE_MIN_ROWS && num_equations == a.ncols() {
        match a.as_ref().sp_lu() {
            Ok(lu) => {
                let rhs_view = StridedView::new(rhs);
                let solution = linalg::mat_col_to_array(lu.solve(rhs_view.as_mat()).as_ref(), 0);
                if solution.iter().all(|v| v.is_finite()) {
                    log::debug!("computed B-spline coefficients with the sparse LU solver");
                    return Ok(solution);
                }
                log::debug!("sparse LU produced a non-finite solution; falling back to dense QR");
            }
            Err(_) => {
                log::debug!("sparse LU factorization failed; falling back to dense QR");
            }
        }
    }
    dense_least_squares(a, rhs)
}

fn dense_least_squares(
    a: &SparseColMat<usize, f64>,
    rhs: &Array1<f64>,
) -> Result<Array1<f64>, BuildError> {
    let dense = linalg::sparse_to_dense(a);
    let a_view = StridedView::new(&dense);
    let qr = a_view.as_mat().qr();
    let rhs_view = StridedView::new(rhs);
    let solution = linalg::mat_col_to_array(qr.solve_lstsq(rhs_view.as_mat()).as_ref(), 0);
    if solution.iter().all(|v| v.is_finite()) {
        log::debug!("computed B-spline coefficients with the dense QR solver");
        Ok(solution)
    } else {
        Err(BuildError::SolverFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn dense_path_solves_a_small_square_system() {
        let triplets = vec![
            Triplet::new(0, 0, 2.0),
            Triplet::new(0, 1, 1.0),
            Triplet::new(1, 0, 1.0),
            Triplet::new(1, 1, 3.0),
        ];
        let a = linalg::sparse_from_triplets(2, 2, &triplets).expect("valid triplets");
        let rhs = array![5.0, 10.0];
        let x = solve(&a, &rhs).expect("solvable system");
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn overdetermined_system_gets_a_least_squares_fit() {
        // Three equations, one unknown: x = mean of the targets.
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(1, 0, 1.0),
            Triplet::new(2, 0, 1.0),
        ];
        let a = linalg::sparse_from_triplets(3, 1, &triplets).expect("valid triplets");
        let rhs = array![1.0, 2.0, 6.0];
        let x = solve(&a, &rhs).expect("least squares fit");
        assert_abs_diff_eq!(x[0], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn large_sparse_square_system_solves_via_sparse_lu() {
        // Tridiagonal system of 120 equations, above the sparse-solve
        // threshold.
        let n = 120;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push(Triplet::new(i, i, 4.0));
            if i + 1 < n {
                triplets.push(Triplet::new(i, i + 1, 1.0));
                triplets.push(Triplet::new(i + 1, i, 1.0));
            }
        }
        let a = linalg::sparse_from_triplets(n, n, &triplets).expect("valid triplets");
        let x_true = Array1::from_iter((0..n).map(|i| (i % 7) as f64 - 3.0));
        let rhs = linalg::sparse_matvec(&a, &x_true);
        let x = solve(&a, &rhs).expect("solvable system");
        for i in 0..n {
            assert_abs_diff_eq!(x[i], x_true[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn singular_system_reports_solver_failure() {
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(0, 1, 1.0),
            Triplet::new(1, 0, 1.0),
            Triplet::new(1, 1, 1.0),
        ];
        let a = linalg::sparse_from_triplets(2, 2, &triplets).expect("valid triplets");
        let rhs = array![1.0, 2.0];
        assert!(matches!(solve(&a, &rhs), Err(BuildError::SolverFailure)));
    }
}
