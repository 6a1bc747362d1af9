//! Core linear-algebra traits for kryst-block.

use crate::matrix::vector::Distribution;
use std::any::Any;

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Base interface for any matrix handed to a preconditioner's `setup`.
///
/// Block preconditioners downcast through [`LinearOperator::as_any`] to the
/// concrete block-capable type; other preconditioners may work through `apply`
/// alone.
pub trait LinearOperator: Any + Send + Sync {
    /// Number of global rows.
    fn nrows(&self) -> usize;
    /// Number of global columns.
    fn ncols(&self) -> usize;
    /// Row distribution of the operator.
    fn distribution(&self) -> Distribution {
        Distribution::serial(self.nrows())
    }
    /// Compute y = A · x on raw slices.
    fn apply(&self, x: &[f64], y: &mut [f64]);
    /// Upcast for downcasting to the concrete matrix type.
    fn as_any(&self) -> &dyn Any;
}
