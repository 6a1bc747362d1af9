//! Block-diagonal preconditioner (block Jacobi over DOF-type blocks).
//!
//! Only the diagonal blocks `(i, i)` are kept; every block is solved
//! independently by its own subsidiary preconditioner, a dense LU unless a
//! subsidiary preconditioner function is set. Off-diagonal coupling is dropped,
//! so the approximation is good when the blocks are weakly coupled.
//!
//! With two-level parallelisation enabled the diagonal blocks are handed to a
//! [`PreconditionerArray`], which sets up and solves all of them in one batched
//! dispatch instead of `n` sequential calls.

use crate::block::BlockPreconditioner;
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::DoubleVector;
use crate::parallel::{Comm, PreconditionerArray, SerialComm};
use crate::preconditioner::{GeneralPurposeBlockPreconditioner, Preconditioner};
use std::sync::Arc;
use std::time::Instant;

pub struct BlockDiagonalPreconditioner {
    base: BlockPreconditioner,
    /// One subsidiary per diagonal block (sequential path only)
    diagonal_block_preconditioners: Vec<Box<dyn Preconditioner>>,
    /// Owns the subsidiaries on the two-level path
    preconditioner_array: Option<PreconditionerArray>,
    use_two_level_parallelisation: bool,
    comm: Arc<dyn Comm>,
    doc_time_during_preconditioner_solve: bool,
}

impl Default for BlockDiagonalPreconditioner {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDiagonalPreconditioner {
    pub fn new() -> Self {
        Self {
            base: BlockPreconditioner::new(),
            diagonal_block_preconditioners: Vec::new(),
            preconditioner_array: None,
            use_two_level_parallelisation: false,
            comm: Arc::new(SerialComm),
            doc_time_during_preconditioner_solve: false,
        }
    }

    /// Batch all block setups and solves into one dispatch from the next `setup` on.
    pub fn enable_two_level_parallelisation(&mut self) {
        self.use_two_level_parallelisation = true;
    }

    pub fn disable_two_level_parallelisation(&mut self) {
        self.use_two_level_parallelisation = false;
    }

    pub fn uses_two_level_parallelisation(&self) -> bool {
        self.use_two_level_parallelisation
    }

    /// Communicator used to distribute blocks on the two-level path.
    pub fn set_communicator(&mut self, comm: Arc<dyn Comm>) {
        self.comm = comm;
    }

    /// Log the time taken by each block preconditioner in `preconditioner_solve`.
    pub fn enable_doc_time_during_preconditioner_solve(&mut self) {
        self.doc_time_during_preconditioner_solve = true;
    }

    pub fn disable_doc_time_during_preconditioner_solve(&mut self) {
        self.doc_time_during_preconditioner_solve = false;
    }

    /// The preconditioner of block `i`; `None` before setup or on the two-level path.
    pub fn subsidiary_block_preconditioner(&self, i: usize) -> Option<&dyn Preconditioner> {
        self.diagonal_block_preconditioners.get(i).map(|p| p.as_ref())
    }

    pub fn subsidiary_block_preconditioner_mut(&mut self, i: usize) -> Option<&mut dyn Preconditioner> {
        match self.diagonal_block_preconditioners.get_mut(i) {
            Some(p) => Some(p.as_mut()),
            None => None,
        }
    }
}

impl Preconditioner for BlockDiagonalPreconditioner {
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError> {
        const LOC: &str = "BlockDiagonalPreconditioner::setup";
        self.clean_up_memory();

        let a = BlockPreconditioner::cast_matrix(matrix, LOC)?;
        self.base.block_setup(a)?;
        let nblock_types = self.base.nblock_types();

        let mut preconditioners: Vec<Box<dyn Preconditioner>> =
            (0..nblock_types).map(|_| self.base.new_subsidiary_preconditioner()).collect();

        if self.use_two_level_parallelisation {
            let blocks = (0..nblock_types)
                .map(|i| self.base.get_block(a, i, i))
                .collect::<Result<Vec<_>, _>>()?;
            let start = Instant::now();
            let mut array = PreconditionerArray::new(Arc::clone(&self.comm));
            array.setup_preconditioners(blocks, preconditioners)?;
            log::debug!(
                "{}: took {:.3e}s to set up {} blocks (two-level)",
                LOC,
                start.elapsed().as_secs_f64(),
                nblock_types
            );
            self.preconditioner_array = Some(array);
        } else {
            for (i, p) in preconditioners.iter_mut().enumerate() {
                // block is dropped as soon as its preconditioner is set up
                let block = self.base.get_block(a, i, i)?;
                let start = Instant::now();
                p.setup(&block).map_err(|e| KError::subsidiary(i, e))?;
                log::debug!("{}: took {:.3e}s to set up block {}", LOC, start.elapsed().as_secs_f64(), i);
            }
            self.diagonal_block_preconditioners = preconditioners;
        }
        Ok(())
    }

    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError> {
        const LOC: &str = "BlockDiagonalPreconditioner::preconditioner_solve";
        let block_r = self.base.get_block_vectors(r)?;
        self.base.ensure_built(z, LOC)?;

        let block_z = match &self.preconditioner_array {
            Some(array) => array.solve_preconditioners(&block_r)?,
            None => {
                if self.diagonal_block_preconditioners.len() != block_r.len() {
                    return Err(KError::BlockSetupRequired { location: LOC });
                }
                let mut block_z = Vec::with_capacity(block_r.len());
                for (i, (p, r_i)) in self.diagonal_block_preconditioners.iter().zip(&block_r).enumerate() {
                    let start = self.doc_time_during_preconditioner_solve.then(Instant::now);
                    let mut z_i = DoubleVector::new();
                    p.preconditioner_solve(r_i, &mut z_i).map_err(|e| KError::subsidiary(i, e))?;
                    if let Some(start) = start {
                        log::info!(
                            "Time for application of {}-th block preconditioner: {:.3e}s",
                            i,
                            start.elapsed().as_secs_f64()
                        );
                    }
                    block_z.push(z_i);
                }
                block_z
            }
        };

        self.base.return_block_vectors(&block_z, z)
    }

    fn clean_up_memory(&mut self) {
        self.preconditioner_array = None;
        self.diagonal_block_preconditioners.clear();
        self.base.clear_block_preconditioner_base();
    }
}

impl GeneralPurposeBlockPreconditioner for BlockDiagonalPreconditioner {
    fn block_base(&self) -> &BlockPreconditioner {
        &self.base
    }
    fn block_base_mut(&mut self) -> &mut BlockPreconditioner {
        &mut self.base
    }
}
