// Pass-through block preconditioner.
//
// Builds the lookup scheme and nothing else; useful where raw block access is
// wanted without any approximation.

use crate::block::BlockPreconditioner;
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::{CsrMatrix, DoubleVector};
use crate::preconditioner::{GeneralPurposeBlockPreconditioner, Preconditioner};

/// Identity preconditioner that still performs the block setup.
#[derive(Debug, Default)]
pub struct DummyBlockPreconditioner {
    base: BlockPreconditioner,
    matrix: Option<CsrMatrix>,
}

impl DummyBlockPreconditioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `(i, j)` of the matrix passed to the last `setup`.
    pub fn get_block(&self, i: usize, j: usize) -> Result<CsrMatrix, KError> {
        let a = self
            .matrix
            .as_ref()
            .ok_or(KError::BlockSetupRequired { location: "DummyBlockPreconditioner::get_block" })?;
        self.base.get_block(a, i, j)
    }

    /// Split `v` into block vectors using the current lookup scheme.
    pub fn get_block_vectors(&self, v: &DoubleVector) -> Result<Vec<DoubleVector>, KError> {
        self.base.get_block_vectors(v)
    }

    pub fn return_block_vectors(&self, ws: &[DoubleVector], v: &mut DoubleVector) -> Result<(), KError> {
        self.base.return_block_vectors(ws, v)
    }
}

impl Preconditioner for DummyBlockPreconditioner {
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError> {
        self.clean_up_memory();
        let a = BlockPreconditioner::cast_matrix(matrix, "DummyBlockPreconditioner::setup")?;
        self.base.block_setup(a)?;
        self.matrix = Some(a.clone());
        Ok(())
    }

    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError> {
        const LOC: &str = "DummyBlockPreconditioner::preconditioner_solve";
        let n = self.base.distribution(LOC)?.nrow_local();
        if r.len() != n {
            return Err(KError::DimensionMismatch { location: LOC, expected: n, found: r.len() });
        }
        z.build_from(r);
        Ok(())
    }

    fn clean_up_memory(&mut self) {
        self.matrix = None;
        self.base.clear_block_preconditioner_base();
    }
}

impl GeneralPurposeBlockPreconditioner for DummyBlockPreconditioner {
    fn block_base(&self) -> &BlockPreconditioner {
        &self.base
    }
    fn block_base_mut(&mut self) -> &mut BlockPreconditioner {
        &mut self.base
    }
}
