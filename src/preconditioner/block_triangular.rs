//! General-purpose block-triangular preconditioner (upper by default).
//!
//! Each diagonal block gets a subsidiary preconditioner; the strictly upper
//! (or lower) blocks are kept as multiply-only operators and used for block
//! back (or forward) substitution.

use crate::block::BlockPreconditioner;
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::DoubleVector;
use crate::preconditioner::{GeneralPurposeBlockPreconditioner, MatrixVectorProduct, Preconditioner};

pub struct BlockTriangularPreconditioner {
    base: BlockPreconditioner,
    diagonal_block_preconditioners: Vec<Box<dyn Preconditioner>>,
    /// `[i][j]`, populated on the active strict triangle only
    off_diagonal_matrix_vector_products: Vec<Vec<Option<MatrixVectorProduct>>>,
    upper_triangular: bool,
}

impl Default for BlockTriangularPreconditioner {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockTriangularPreconditioner {
    /// Upper triangular, direct-solve subsidiaries.
    pub fn new() -> Self {
        Self {
            base: BlockPreconditioner::new(),
            diagonal_block_preconditioners: Vec::new(),
            off_diagonal_matrix_vector_products: Vec::new(),
            upper_triangular: true,
        }
    }

    /// Use as an upper triangular preconditioner
    pub fn upper_triangular(&mut self) {
        self.upper_triangular = true;
    }

    /// Use as a lower triangular preconditioner
    pub fn lower_triangular(&mut self) {
        self.upper_triangular = false;
    }

    pub fn is_upper_triangular(&self) -> bool {
        self.upper_triangular
    }

    pub fn subsidiary_block_preconditioner(&self, i: usize) -> Option<&dyn Preconditioner> {
        self.diagonal_block_preconditioners.get(i).map(|p| p.as_ref())
    }

    /// Number of off-diagonal operators currently held.
    pub fn noff_diagonal_operators(&self) -> usize {
        self.off_diagonal_matrix_vector_products
            .iter()
            .flatten()
            .filter(|op| op.is_some())
            .count()
    }

    /// Block indices in solve order.
    fn sweep(&self, nblock: usize) -> Vec<usize> {
        if self.upper_triangular {
            (0..nblock).rev().collect()
        } else {
            (0..nblock).collect()
        }
    }
}

impl Preconditioner for BlockTriangularPreconditioner {
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError> {
        const LOC: &str = "BlockTriangularPreconditioner::setup";
        self.clean_up_memory();

        let a = BlockPreconditioner::cast_matrix(matrix, LOC)?;
        self.base.block_setup(a)?;
        let nblock_types = self.base.nblock_types();

        let mut preconditioners = Vec::with_capacity(nblock_types);
        let mut products: Vec<Vec<Option<MatrixVectorProduct>>> =
            (0..nblock_types).map(|_| (0..nblock_types).map(|_| None).collect()).collect();

        for i in 0..nblock_types {
            let mut p = self.base.new_subsidiary_preconditioner();
            let block = self.base.get_block(a, i, i)?;
            p.setup(&block).map_err(|e| KError::subsidiary(i, e))?;
            drop(block);
            preconditioners.push(p);

            let (l, u) = if self.upper_triangular { (i + 1, nblock_types) } else { (0, i) };
            for j in l..u {
                let mut op = MatrixVectorProduct::new();
                op.setup(self.base.get_block(a, i, j)?);
                products[i][j] = Some(op);
            }
        }

        self.diagonal_block_preconditioners = preconditioners;
        self.off_diagonal_matrix_vector_products = products;
        log::debug!("{}: {} diagonal blocks, {} off-diagonal operators", LOC, nblock_types, self.noff_diagonal_operators());
        Ok(())
    }

    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError> {
        const LOC: &str = "BlockTriangularPreconditioner::preconditioner_solve";
        let mut block_r = self.base.get_block_vectors(r)?;
        let nblock = block_r.len();
        if self.diagonal_block_preconditioners.len() != nblock {
            return Err(KError::BlockSetupRequired { location: LOC });
        }
        self.base.ensure_built(z, LOC)?;

        let mut block_z = vec![DoubleVector::new(); nblock];
        let sweep = self.sweep(nblock);
        let mut temp = DoubleVector::new();
        for (pos, &i) in sweep.iter().enumerate() {
            // solve
            self.diagonal_block_preconditioners[i]
                .preconditioner_solve(&block_r[i], &mut block_z[i])
                .map_err(|e| KError::subsidiary(i, e))?;

            // substitute into every block still to come
            for &j in &sweep[pos + 1..] {
                let op = self.off_diagonal_matrix_vector_products[j][i]
                    .as_ref()
                    .ok_or(KError::BlockSetupRequired { location: LOC })?;
                op.multiply(&block_z[i], &mut temp)?;
                block_r[j] -= &temp;
            }
        }

        self.base.return_block_vectors(&block_z, z)
    }

    fn clean_up_memory(&mut self) {
        // operators first, then the preconditioners they were built alongside
        self.off_diagonal_matrix_vector_products.clear();
        self.diagonal_block_preconditioners.clear();
        self.base.clear_block_preconditioner_base();
    }
}

impl Drop for BlockTriangularPreconditioner {
    fn drop(&mut self) {
        self.clean_up_memory();
    }
}

impl GeneralPurposeBlockPreconditioner for BlockTriangularPreconditioner {
    fn block_base(&self) -> &BlockPreconditioner {
        &self.base
    }
    fn block_base_mut(&mut self) -> &mut BlockPreconditioner {
        &mut self.base
    }
}
