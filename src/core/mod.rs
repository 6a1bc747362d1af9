//! Core traits and adapters shared by matrices and preconditioners.

pub mod traits;
pub mod wrappers;

pub use traits::{LinearOperator, MatVec};
