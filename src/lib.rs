//! kryst-block: general-purpose block preconditioners over Faer
//!
//! This crate splits a sparse multi-physics system into blocks by degree-of-freedom
//! type and builds block-diagonal, block-triangular, or exact preconditioners from
//! those blocks, with pluggable (and nestable) subsidiary preconditioners and an
//! optional batched two-level dispatch of the block solves.

pub mod parallel;

pub mod block;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod matrix;
pub mod preconditioner;

// Re-exports for convenience
pub use block::*;
pub use config::*;
pub use context::*;
pub use self::core::*;
pub use error::*;
pub use matrix::*;
pub use preconditioner::*;
