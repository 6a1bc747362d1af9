//! Context module for block preconditioner construction.
//!
//! Contexts encapsulate strategy selection and parameter management, and
//! construct configured preconditioners from typed options.
//!
//! Modules:
//! - [`pc_context`]: the `BlockPc` builder and the stock subsidiary factories.
//!
//! # Example
//! ```rust,ignore
//! use kryst_block::context::BlockPc;
//! let pc = BlockPc::from_options(&opts).mesh(mesh).build();
//! ```

pub mod pc_context;
pub use pc_context::{BlockPc, ilu0, jacobi, lu};
