//! Typed configuration for block preconditioners.

pub mod options;

pub use options::{BlockPcOptions, BlockPcType, SubsidiaryKind};
