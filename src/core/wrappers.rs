//! Wrappers for faer dense matrix types.
//!
//! Dense `faer::Mat<f64>` values can be handed to any preconditioner as a
//! [`LinearOperator`]. Subsidiary solvers such as `LuPreconditioner` factorize
//! them directly. Block preconditioners reject them at `setup`, since a dense
//! matrix carries no block-capable sparse structure.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)

use crate::core::traits::{LinearOperator, MatVec};
use crate::matrix::vector::DoubleVector;
use faer::Mat;
use std::any::Any;

/// Dense y = A x on raw slices.
fn dense_matvec(a: &Mat<f64>, x: &[f64], y: &mut [f64]) {
    assert_eq!(a.nrows(), y.len(), "Output vector y has incorrect length");
    assert_eq!(a.ncols(), x.len(), "Input vector x has incorrect length");
    for (i, yi) in y.iter_mut().enumerate() {
        *yi = (0..a.ncols()).map(|j| a[(i, j)] * x[j]).sum();
    }
}

/// Implements matrix-vector multiplication for `faer::Mat`.
///
/// Computes `y = A * x`; `y` is rebuilt serially when its length is wrong.
impl MatVec<DoubleVector> for Mat<f64> {
    fn matvec(&self, x: &DoubleVector, y: &mut DoubleVector) {
        if y.len() != self.nrows() {
            y.build(crate::matrix::vector::Distribution::serial(self.nrows()), 0.0);
        }
        dense_matvec(self, x.values(), y.values_mut());
    }
}

impl LinearOperator for Mat<f64> {
    fn nrows(&self) -> usize {
        Mat::nrows(self)
    }
    fn ncols(&self) -> usize {
        Mat::ncols(self)
    }
    fn apply(&self, x: &[f64], y: &mut [f64]) {
        dense_matvec(self, x, y)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_operator_matches_manual_product() {
        let a = Mat::from_fn(2, 3, |i, j| (i * 3 + j) as f64);
        let x = vec![1.0, -1.0, 2.0];
        let mut y = vec![0.0; 2];
        LinearOperator::apply(&a, &x, &mut y);
        assert_eq!(y, vec![0.0 - 1.0 + 4.0, 3.0 - 4.0 + 10.0]);
    }

    #[test]
    fn matvec_builds_unbuilt_output() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 3.0 } else { 0.0 });
        let x = DoubleVector::from(vec![1.0, 2.0]);
        let mut y = DoubleVector::new();
        a.matvec(&x, &mut y);
        assert!(y.built());
        assert_eq!(y.values(), &[3.0, 6.0]);
    }
}
