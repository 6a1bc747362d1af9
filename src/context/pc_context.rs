//! Preconditioner context: turns [`BlockPcOptions`] into a ready-to-setup
//! block preconditioner.
//!
//! The context collects what options cannot express (meshes, a communicator)
//! and builds the selected strategy with every option applied.
//!
//! # Example
//!
//! ```rust
//! use kryst_block::block::DofTypeMap;
//! use kryst_block::config::BlockPcOptions;
//! use kryst_block::context::BlockPc;
//! use std::sync::Arc;
//!
//! let opts = BlockPcOptions::from_args(&["-pc_block_type", "exact"]).unwrap();
//! let pc = BlockPc::from_options(&opts)
//!     .mesh(Arc::new(DofTypeMap::from_types(vec![0, 1, 0, 1])))
//!     .build();
//! ```

use crate::block::DofClassifier;
use crate::config::{BlockPcOptions, BlockPcType, SubsidiaryKind};
use crate::parallel::Comm;
use crate::preconditioner::{
    BlockDiagonalPreconditioner, BlockTriangularPreconditioner, DummyBlockPreconditioner,
    ExactBlockPreconditioner, GeneralPurposeBlockPreconditioner, Ilu0, Jacobi, LuPreconditioner,
    Preconditioner, SubsidiaryPreconditionerFn,
};
use std::sync::Arc;

/// Dense LU subsidiary.
pub fn lu() -> Box<dyn Preconditioner> {
    Box::new(LuPreconditioner::new())
}

/// Jacobi subsidiary.
pub fn jacobi() -> Box<dyn Preconditioner> {
    Box::new(Jacobi::new())
}

/// ILU(0) subsidiary.
pub fn ilu0() -> Box<dyn Preconditioner> {
    Box::new(Ilu0::new())
}

impl SubsidiaryKind {
    /// Factory for this kind; `None` for the built-in direct solve.
    pub fn factory(self) -> Option<SubsidiaryPreconditionerFn> {
        match self {
            SubsidiaryKind::Lu => None,
            SubsidiaryKind::Jacobi => Some(jacobi as SubsidiaryPreconditionerFn),
            SubsidiaryKind::Ilu0 => Some(ilu0 as SubsidiaryPreconditionerFn),
        }
    }
}

/// Builder for a configured block preconditioner.
#[derive(Clone)]
pub struct BlockPc {
    options: BlockPcOptions,
    meshes: Vec<Arc<dyn DofClassifier>>,
    comm: Option<Arc<dyn Comm>>,
}

impl BlockPc {
    pub fn from_options(options: &BlockPcOptions) -> Self {
        Self { options: options.clone(), meshes: Vec::new(), comm: None }
    }

    /// Add a mesh; meshes keep the order in which they are added.
    pub fn mesh(mut self, mesh: Arc<dyn DofClassifier>) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Communicator for the two-level path of the block-diagonal strategy.
    pub fn communicator(mut self, comm: Arc<dyn Comm>) -> Self {
        self.comm = Some(comm);
        self
    }

    pub fn options(&self) -> &BlockPcOptions {
        &self.options
    }

    pub fn build(self) -> Box<dyn Preconditioner> {
        let opts = &self.options;
        match opts.pc_type {
            BlockPcType::Diagonal => {
                let mut pc = BlockDiagonalPreconditioner::new();
                if opts.two_level {
                    pc.enable_two_level_parallelisation();
                }
                if opts.doc_time {
                    pc.enable_doc_time_during_preconditioner_solve();
                }
                if let Some(comm) = &self.comm {
                    pc.set_communicator(Arc::clone(comm));
                }
                self.configure(pc)
            }
            BlockPcType::Triangular => {
                let mut pc = BlockTriangularPreconditioner::new();
                if !opts.upper {
                    pc.lower_triangular();
                }
                self.configure(pc)
            }
            BlockPcType::Exact => {
                let mut pc = ExactBlockPreconditioner::new();
                pc.set_block_assembly(opts.assembly);
                self.configure(pc)
            }
            BlockPcType::Dummy => self.configure(DummyBlockPreconditioner::new()),
        }
    }

    /// Apply the settings every strategy shares.
    fn configure<P: GeneralPurposeBlockPreconditioner + 'static>(&self, mut pc: P) -> Box<dyn Preconditioner> {
        for mesh in &self.meshes {
            pc.add_mesh(Arc::clone(mesh));
        }
        if let Some(map) = &self.options.dof_to_block_map {
            pc.set_dof_to_block_map(map);
        }
        if let Some(f) = self.options.subsidiary.factory() {
            pc.set_subsidiary_preconditioner_function(f);
        }
        log::debug!(
            "BlockPc::build: {:?} block preconditioner over {} mesh(es)",
            self.options.pc_type,
            self.meshes.len()
        );
        Box::new(pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DofTypeMap;
    use crate::matrix::{CsrMatrix, DoubleVector};

    #[test]
    fn built_triangular_respects_lower_flag() {
        // block lower triangular: exact in lower mode only
        let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 2.0), (1, 0, 1.0), (1, 1, 4.0)]);
        let r = DoubleVector::from(vec![2.0, 9.0]);
        let mesh: Arc<dyn DofClassifier> = Arc::new(DofTypeMap::from_types(vec![0, 1]));

        let opts = BlockPcOptions::from_args(&["-pc_block_type", "triangular", "-pc_block_lower"]).unwrap();
        let mut pc = BlockPc::from_options(&opts).mesh(Arc::clone(&mesh)).build();
        pc.setup(&a).unwrap();
        let mut z = DoubleVector::new();
        pc.preconditioner_solve(&r, &mut z).unwrap();
        assert!((z[1] - 2.0).abs() < 1e-12);

        let opts = BlockPcOptions::from_args(&["-pc_block_type", "triangular"]).unwrap();
        let mut pc = BlockPc::from_options(&opts).mesh(mesh).build();
        pc.setup(&a).unwrap();
        pc.preconditioner_solve(&r, &mut z).unwrap();
        assert!((z[1] - 2.25).abs() < 1e-12);
    }

    #[test]
    fn lu_is_the_builtin_default() {
        assert!(SubsidiaryKind::Lu.factory().is_none());
        assert!(SubsidiaryKind::Jacobi.factory().is_some());
    }
}
