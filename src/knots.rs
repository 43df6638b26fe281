use crate::builder::BuildError;
use ndarray::Array1;

/// Placement policy for the per-axis knot vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnotSpacing {
    /// Mimic the spacing of the sample points with a moving average,
    /// clamped to (p+1)-multiplicity end knots.
    #[default]
    AsSampled,
    /// Equidistant knots over the (optionally padded and bounded) data
    /// range, clamped.
    Equidistant,
    /// Bucketed moving average with a capped segment count. Experimental.
    Experimental,
}

/// Per-axis domain override. A NaN slot falls back to the data extent on
/// that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBounds {
    pub lower: f64,
    pub upper: f64,
}

impl AxisBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Both sides taken from the data extent.
    pub fn data_extent() -> Self {
        Self {
            lower: f64::NAN,
            upper: f64::NAN,
        }
    }
}

/// Cap on the segment count of the bucketed strategy. Fixed, and
/// deliberately independent of the requested number of basis functions.
const MAX_BUCKET_SEGMENTS: usize = 10;

pub(crate) fn compute_knot_vector(
    axis: usize,
    values: &[f64],
    degree: usize,
    num_basis_functions: usize,
    bounds: AxisBounds,
    padding: f64,
    spacing: KnotSpacing,
) -> Result<Array1<f64>, BuildError> {
    match spacing {
        KnotSpacing::AsSampled => moving_average_knots(axis, values, degree),
        KnotSpacing::Equidistant => {
            equidistant_knots(axis, values, degree, num_basis_functions, bounds, padding)
        }
        KnotSpacing::Experimental => bucketed_knots(axis, values, degree),
    }
}

/// (p+1)-regular knot vector mimicking the sample spacing.
///
/// With n sorted unique values the n-p-1 interior knots are moving
/// averages over windows of p+2 consecutive values; the end values are
/// repeated p+1 times each, giving n+p+1 knots for n basis functions.
/// For equidistant samples this reproduces the free-end-condition knot
/// vector of cubic interpolation: (a,b,c,d,e,f) with p = 3 becomes
/// (a,a,a,a,c,d,f,f,f,f).
fn moving_average_knots(
    axis: usize,
    values: &[f64],
    degree: usize,
) -> Result<Array1<f64>, BuildError> {
    let unique = unique_sorted(values);
    let n = unique.len();
    require_min_unique(axis, n, degree)?;

    let interior = n - degree - 1;
    let window = degree + 2;

    let mut knots = Vec::with_capacity(n + degree + 1);
    for _ in 0..=degree {
        knots.push(unique[0]);
    }
    for i in 0..interior {
        let sum: f64 = unique[i..i + window].iter().sum();
        knots.push(sum / window as f64);
    }
    for _ in 0..=degree {
        knots.push(unique[n - 1]);
    }

    Ok(Array1::from_vec(knots))
}

/// Equidistant clamped knots over [lo, hi], where lo/hi come from the
/// axis bounds (NaN slots fall back to the data extent) and are then
/// padded outward by `padding * (hi - lo)`.
///
/// The basis size n is the requested count when positive, else the
/// number of unique values. Both end knots get multiplicity p+1 even
/// when there are no interior knots, so the vector always has n+p+1
/// entries.
fn equidistant_knots(
    axis: usize,
    values: &[f64],
    degree: usize,
    num_basis_functions: usize,
    bounds: AxisBounds,
    padding: f64,
) -> Result<Array1<f64>, BuildError> {
    let unique = unique_sorted(values);
    let n = if num_basis_functions > 0 {
        num_basis_functions
    } else {
        unique.len()
    };
    require_min_unique(axis, n, degree)?;

    let mut lo = if bounds.lower.is_nan() {
        unique[0]
    } else {
        bounds.lower
    };
    let mut hi = if bounds.upper.is_nan() {
        unique[unique.len() - 1]
    } else {
        bounds.upper
    };
    let pad = (hi - lo) * padding;
    lo -= pad;
    hi += pad;

    let interior = n - degree - 1;
    let step = (hi - lo) / (interior as f64 + 1.0);

    let mut knots = Vec::with_capacity(n + degree + 1);
    for _ in 0..=degree {
        knots.push(lo);
    }
    for i in 1..=interior {
        knots.push(lo + i as f64 * step);
    }
    for _ in 0..=degree {
        knots.push(hi);
    }

    Ok(Array1::from_vec(knots))
}

/// Bucketed moving average: the unique values are split into roughly
/// equal windows, one interior knot per window, with the total segment
/// count capped at `MAX_BUCKET_SEGMENTS`.
fn bucketed_knots(axis: usize, values: &[f64], degree: usize) -> Result<Array1<f64>, BuildError> {
    let unique = unique_sorted(values);
    let n = unique.len();
    require_min_unique(axis, n, degree)?;

    let mut interior = n - degree - 1;
    let segments = interior + degree + 1;
    if segments > MAX_BUCKET_SEGMENTS && MAX_BUCKET_SEGMENTS >= degree + 1 {
        interior = MAX_BUCKET_SEGMENTS - degree - 1;
    }

    let mut windows = Vec::new();
    if interior > 0 {
        let base = n / interior;
        let residual = n - base * interior;
        windows = vec![base; interior];
        for window in windows.iter_mut().take(residual) {
            *window += 1;
        }
    }

    let mut knots = Vec::with_capacity(interior + 2 * (degree + 1));
    for _ in 0..=degree {
        knots.push(unique[0]);
    }
    let mut cursor = 0;
    for &window in &windows {
        let sum: f64 = unique[cursor..cursor + window].iter().sum();
        knots.push(sum / window as f64);
        cursor += window;
    }
    for _ in 0..=degree {
        knots.push(unique[n - 1]);
    }

    Ok(Array1::from_vec(knots))
}

fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut unique = values.to_vec();
    unique.sort_by(f64::total_cmp);
    unique.dedup();
    unique
}

fn require_min_unique(axis: usize, unique: usize, degree: usize) -> Result<(), BuildError> {
    if unique < degree + 1 {
        return Err(BuildError::InsufficientUniqueValues {
            axis,
            unique,
            degree,
            required: degree + 1,
        });
    }
    Ok(())
}
