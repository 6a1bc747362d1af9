//! Block decomposition of a multi-physics system.
//!
//! - [`mesh`]: DOF classification supplied by the finite-element layer.
//! - [`lookup`]: the global ↔ block-local equation mapping.
//! - [`base`]: block extraction, assembly, and vector partitioning shared by
//!   every block preconditioner.

pub mod base;
pub mod lookup;
pub mod mesh;

pub use base::{BlockMatrices, BlockPreconditioner};
pub use lookup::BlockLookupScheme;
pub use mesh::{DofClassifier, DofTypeMap};
