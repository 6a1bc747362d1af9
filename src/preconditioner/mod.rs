//! Preconditioners for linear solvers.
//!
//! This module defines the `Preconditioner` trait and includes the subsidiary
//! solvers (dense LU, Jacobi, ILU(0)) together with the general-purpose block
//! strategies built on top of them (block-diagonal, block-triangular, exact,
//! and the pass-through dummy).

use crate::block::{BlockPreconditioner, DofClassifier};
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::DoubleVector;
use std::sync::Arc;

/// A preconditioner M ≈ A⁻¹.
///
/// `setup` factorizes (or otherwise prepares) from a matrix; `preconditioner_solve`
/// applies the result. Block strategies implement this trait too, so they nest as
/// subsidiaries of one another.
pub trait Preconditioner: Send + Sync {
    /// Setup/factorize from A, replacing any previous state.
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError>;

    /// Apply M⁻¹ to r, writing z = M⁻¹ r.
    ///
    /// `z` is built to the correct length if it is not already.
    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError>;

    /// Release everything built by `setup`.
    fn clean_up_memory(&mut self) {}
}

/// Constructor for subsidiary preconditioners.
///
/// A plain function pointer: it cannot capture state, so every call yields an
/// independent preconditioner that the caller owns outright.
pub type SubsidiaryPreconditionerFn = fn() -> Box<dyn Preconditioner>;

/// Configuration shared by every general-purpose block preconditioner.
///
/// Implementors expose their [`BlockPreconditioner`] base; the provided
/// methods configure it. Changes take effect at the next `setup`.
pub trait GeneralPurposeBlockPreconditioner: Preconditioner {
    fn block_base(&self) -> &BlockPreconditioner;
    fn block_base_mut(&mut self) -> &mut BlockPreconditioner;

    /// Build every subsidiary preconditioner with `f` instead of a direct solve.
    fn set_subsidiary_preconditioner_function(&mut self, f: SubsidiaryPreconditionerFn) {
        self.block_base_mut().set_subsidiary_preconditioner_function(f);
    }

    /// Return to direct solves for the subsidiary systems.
    fn unset_subsidiary_preconditioner_function(&mut self) {
        self.block_base_mut().unset_subsidiary_preconditioner_function();
    }

    /// Add a mesh whose DOFs this preconditioner covers.
    fn add_mesh(&mut self, mesh: Arc<dyn DofClassifier>) {
        self.block_base_mut().add_mesh(mesh);
    }

    /// Group DOF types into blocks.
    fn set_dof_to_block_map(&mut self, dof_to_block_map: &[usize]) {
        self.block_base_mut().set_dof_to_block_map(dof_to_block_map);
    }

    /// Number of block types found by the last `setup` (zero before).
    fn nblock_types(&self) -> usize {
        self.block_base().nblock_types()
    }
}

// Submodules for various preconditioners
pub mod block_diagonal;
pub mod block_triangular;
pub mod direct_lu;
pub mod dummy;
pub mod exact;
pub mod ilu;
pub mod jacobi;
pub mod matvec_product;

// Re-exports for convenience
pub use block_diagonal::BlockDiagonalPreconditioner;
pub use block_triangular::BlockTriangularPreconditioner;
pub use direct_lu::LuPreconditioner;
pub use dummy::DummyBlockPreconditioner;
pub use exact::{BlockAssembly, ExactBlockPreconditioner};
pub use ilu::Ilu0;
pub use jacobi::Jacobi;
pub use matvec_product::MatrixVectorProduct;
