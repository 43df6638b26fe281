use faer::MatRef;
use faer::sparse::{SparseColMat, SparseRowMat, Triplet};
use ndarray::{Array1, Array2, ArrayBase, CowArray, Data, Dimension, Ix1, Ix2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("Failed to build sparse matrix from triplets: {0}")]
    SparseCreation(String),
}

/// Lends an `ndarray` array to faer for the duration of a solve.
///
/// faer kernels require positively-strided storage, so the array is
/// normalized to standard layout on construction: already-compact
/// arrays are borrowed as-is, while reversed or broadcast views get a
/// compact copy through the copy-on-write conversion.
pub(crate) struct StridedView<'a, D: Dimension> {
    data: CowArray<'a, f64, D>,
}

impl<'a, D: Dimension> StridedView<'a, D> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, D>) -> Self {
        Self {
            data: array.as_standard_layout(),
        }
    }
}

impl StridedView<'_, Ix2> {
    #[inline]
    pub fn as_mat(&self) -> MatRef<'_, f64> {
        let (rows, cols) = self.data.dim();
        let strides = self.data.strides();
        // SAFETY: the standard-layout cow guarantees a live buffer with
        // positive strides for as long as this view is borrowed.
        unsafe { MatRef::from_raw_parts(self.data.as_ptr(), rows, cols, strides[0], strides[1]) }
    }
}

impl StridedView<'_, Ix1> {
    /// The vector as an n-by-1 column matrix.
    #[inline]
    pub fn as_mat(&self) -> MatRef<'_, f64> {
        // SAFETY: as for the two-dimensional case; standard layout
        // makes the element stride exactly one.
        unsafe { MatRef::from_raw_parts(self.data.as_ptr(), self.data.len(), 1, 1, 0) }
    }
}

pub(crate) fn mat_col_to_array(mat: MatRef<'_, f64>, col: usize) -> Array1<f64> {
    let mut out = Array1::<f64>::zeros(mat.nrows());
    for i in 0..mat.nrows() {
        out[i] = mat[(i, col)];
    }
    out
}

pub(crate) fn sparse_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: &[Triplet<usize, usize, f64>],
) -> Result<SparseColMat<usize, f64>, LinalgError> {
    SparseColMat::try_new_from_triplets(nrows, ncols, triplets)
        .map_err(|err| LinalgError::SparseCreation(format!("{err:?}")))
}

/// Expands CSC storage into a dense matrix, column by column.
pub(crate) fn sparse_to_dense(matrix: &SparseColMat<usize, f64>) -> Array2<f64> {
    let (symbolic, values) = matrix.parts();
    let row_idx = symbolic.row_idx();

    let mut out = Array2::<f64>::zeros((matrix.nrows(), matrix.ncols()));
    for (col, window) in symbolic.col_ptr().windows(2).enumerate() {
        let entries = window[0]..window[1];
        for (&row, &value) in row_idx[entries.clone()].iter().zip(&values[entries]) {
            out[[row, col]] = value;
        }
    }
    out
}

/// Matrix-vector product M x over CSC storage: every column scatters
/// its entries, scaled by x[col], into the output rows.
pub(crate) fn sparse_matvec(matrix: &SparseColMat<usize, f64>, vector: &Array1<f64>) -> Array1<f64> {
    debug_assert_eq!(matrix.ncols(), vector.len());
    let (symbolic, values) = matrix.parts();
    let row_idx = symbolic.row_idx();

    let mut out = Array1::<f64>::zeros(matrix.nrows());
    for (col, window) in symbolic.col_ptr().windows(2).enumerate() {
        let scale = vector[col];
        let entries = window[0]..window[1];
        for (&row, &value) in row_idx[entries.clone()].iter().zip(&values[entries]) {
            out[row] += value * scale;
        }
    }
    out
}

pub(crate) fn to_row_major(
    matrix: &SparseColMat<usize, f64>,
) -> Result<SparseRowMat<usize, f64>, LinalgError> {
    matrix
        .as_ref()
        .to_row_major()
        .map_err(|err| LinalgError::SparseCreation(format!("{err:?}")))
}
