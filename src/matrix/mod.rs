//! Matrix module: the CSR block-capable matrix and distributed vectors.

pub mod sparse;
pub mod vector;

pub use sparse::CsrMatrix;
pub use vector::{Distribution, DoubleVector};
