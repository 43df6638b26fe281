#![deny(dead_code)]
#![deny(unused_imports)]

pub mod basis;
pub mod builder;
pub mod data;
pub mod knots;
pub mod spline;

mod assembly;
mod linalg;
mod solver;

pub use basis::SparseBasisRow;
pub use builder::{BuildError, Builder, MAX_DEGREE, Smoothing};
pub use data::{DataError, Sample, SampleTable};
pub use knots::{AxisBounds, KnotSpacing};
pub use linalg::LinalgError;
pub use spline::{EvalError, Spline};
