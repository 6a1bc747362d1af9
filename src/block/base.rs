//! Shared state of every general-purpose block preconditioner.
//!
//! `BlockPreconditioner` holds the configuration consumed at the next `setup`
//! (meshes, DOF-to-block map, subsidiary factory) and the lookup scheme built
//! by `block_setup`. Strategies hold one of these and drive it; it owns no
//! subsidiary preconditioners itself.

use crate::block::lookup::BlockLookupScheme;
use crate::block::mesh::DofClassifier;
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::{CsrMatrix, Distribution, DoubleVector};
use crate::preconditioner::{LuPreconditioner, Preconditioner, SubsidiaryPreconditionerFn};
use std::sync::Arc;

/// Table of optional blocks, indexed `[i][j]`.
pub type BlockMatrices = Vec<Vec<Option<CsrMatrix>>>;

#[derive(Default, Clone)]
pub struct BlockPreconditioner {
    meshes: Vec<Arc<dyn DofClassifier>>,
    dof_to_block_map: Option<Vec<usize>>,
    subsidiary_fn: Option<SubsidiaryPreconditionerFn>,
    lookup: Option<BlockLookupScheme>,
    distribution: Option<Distribution>,
}

impl std::fmt::Debug for BlockPreconditioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPreconditioner")
            .field("nmesh", &self.meshes.len())
            .field("dof_to_block_map", &self.dof_to_block_map)
            .field("custom_subsidiary", &self.subsidiary_fn.is_some())
            .field("lookup", &self.lookup)
            .finish()
    }
}

impl BlockPreconditioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh whose DOFs this preconditioner covers.
    pub fn add_mesh(&mut self, mesh: Arc<dyn DofClassifier>) {
        self.meshes.push(mesh);
    }

    pub fn nmesh(&self) -> usize {
        self.meshes.len()
    }

    /// Group DOF types into blocks; entry `t` is the block type of DOF type `t`.
    ///
    /// Validated at the next `block_setup`. An empty map keeps one block per DOF type.
    pub fn set_dof_to_block_map(&mut self, dof_to_block_map: &[usize]) {
        self.dof_to_block_map = (!dof_to_block_map.is_empty()).then(|| dof_to_block_map.to_vec());
    }

    /// Return to one block per DOF type.
    pub fn clear_dof_to_block_map(&mut self) {
        self.dof_to_block_map = None;
    }

    pub fn set_subsidiary_preconditioner_function(&mut self, f: SubsidiaryPreconditionerFn) {
        self.subsidiary_fn = Some(f);
    }

    /// Return to the default direct solve for subsidiary systems.
    pub fn unset_subsidiary_preconditioner_function(&mut self) {
        self.subsidiary_fn = None;
    }

    /// A fresh subsidiary preconditioner: the factory's product, or a dense LU.
    pub fn new_subsidiary_preconditioner(&self) -> Box<dyn Preconditioner> {
        match self.subsidiary_fn {
            Some(f) => f(),
            None => Box::new(LuPreconditioner::new()),
        }
    }

    /// Downcast the matrix handed to `setup` to the block-capable type.
    pub fn cast_matrix<'a>(
        matrix: &'a dyn LinearOperator,
        location: &'static str,
    ) -> Result<&'a CsrMatrix, KError> {
        matrix
            .as_any()
            .downcast_ref::<CsrMatrix>()
            .ok_or(KError::MatrixType { location })
    }

    /// Build the lookup scheme for `matrix` from the meshes and DOF-to-block map.
    ///
    /// Any previous scheme is discarded first, so a failed call leaves the
    /// preconditioner unset rather than holding a stale layout.
    pub fn block_setup(&mut self, matrix: &CsrMatrix) -> Result<(), KError> {
        self.clear_block_preconditioner_base();
        if matrix.nrows() != matrix.ncols() {
            return Err(KError::DimensionMismatch {
                location: "BlockPreconditioner::block_setup",
                expected: matrix.nrows(),
                found: matrix.ncols(),
            });
        }
        if !matrix.distribution().is_serial() {
            return Err(KError::Unsupported(
                "block extraction requires every matrix row on this process",
            ));
        }
        let lookup = BlockLookupScheme::build(
            matrix.nrows(),
            &self.meshes,
            self.dof_to_block_map.as_deref(),
        )?;
        self.distribution = Some(matrix.distribution());
        self.lookup = Some(lookup);
        Ok(())
    }

    /// Forget the lookup scheme, keeping configuration.
    pub fn clear_block_preconditioner_base(&mut self) {
        self.lookup = None;
        self.distribution = None;
    }

    pub fn is_set_up(&self) -> bool {
        self.lookup.is_some()
    }

    /// The lookup scheme, or `BlockSetupRequired` tagged with `location`.
    pub fn lookup(&self, location: &'static str) -> Result<&BlockLookupScheme, KError> {
        self.lookup.as_ref().ok_or(KError::BlockSetupRequired { location })
    }

    /// Number of block types; zero before `block_setup`.
    pub fn nblock_types(&self) -> usize {
        self.lookup.as_ref().map_or(0, BlockLookupScheme::nblock_types)
    }

    /// Distribution of the full system.
    pub fn distribution(&self, location: &'static str) -> Result<Distribution, KError> {
        self.distribution.ok_or(KError::BlockSetupRequired { location })
    }

    /// Distribution of block `b`.
    pub fn block_distribution(&self, b: usize) -> Result<Distribution, KError> {
        let lookup = self.lookup("BlockPreconditioner::block_distribution")?;
        Ok(Distribution::serial(lookup.block_dimension(b)))
    }

    /// Extract block `(i, j)` of `matrix` as a standalone matrix.
    pub fn get_block(&self, matrix: &CsrMatrix, i: usize, j: usize) -> Result<CsrMatrix, KError> {
        const LOC: &str = "BlockPreconditioner::get_block";
        let lookup = self.lookup(LOC)?;
        check_dim(LOC, lookup.nrow(), matrix.nrows())?;
        let n = lookup.nblock_types();
        check_block_index(LOC, n, i)?;
        check_block_index(LOC, n, j)?;

        let rows = lookup.block_rows(i);
        let mut row_ptr = Vec::with_capacity(rows.len() + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for &g in rows {
            let (cols, vals) = matrix.row(g);
            for (&c, &v) in cols.iter().zip(vals) {
                if lookup.block_number(c) == j {
                    col_idx.push(lookup.index_in_block(c));
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }
        Ok(CsrMatrix::from_csr(rows.len(), lookup.block_dimension(j), row_ptr, col_idx, values))
    }

    /// Extract every block flagged in `required` (`nblock × nblock`).
    pub fn get_blocks(&self, matrix: &CsrMatrix, required: &[Vec<bool>]) -> Result<BlockMatrices, KError> {
        const LOC: &str = "BlockPreconditioner::get_blocks";
        let n = self.lookup(LOC)?.nblock_types();
        check_dim(LOC, n, required.len())?;
        let mut blocks = Vec::with_capacity(n);
        for (i, row) in required.iter().enumerate() {
            check_dim(LOC, n, row.len())?;
            let mut block_row = Vec::with_capacity(n);
            for (j, &needed) in row.iter().enumerate() {
                block_row.push(if needed { Some(self.get_block(matrix, i, j)?) } else { None });
            }
            blocks.push(block_row);
        }
        Ok(blocks)
    }

    /// Concatenate a table of blocks into one matrix in block order.
    ///
    /// `None` entries are zero blocks.
    pub fn build_preconditioner_matrix(&self, blocks: &BlockMatrices) -> Result<CsrMatrix, KError> {
        const LOC: &str = "BlockPreconditioner::build_preconditioner_matrix";
        let lookup = self.lookup(LOC)?;
        check_dim(LOC, lookup.nblock_types(), blocks.len())?;
        let mut assembler = BlockRowAssembler::new(lookup);
        for (i, row) in blocks.iter().enumerate() {
            assembler.push_block_row(i, row)?;
        }
        assembler.finish()
    }

    /// Copy of the entries of `v` belonging to block `b`.
    pub fn get_block_vector(&self, b: usize, v: &DoubleVector) -> Result<DoubleVector, KError> {
        const LOC: &str = "BlockPreconditioner::get_block_vector";
        let lookup = self.lookup(LOC)?;
        check_dim(LOC, lookup.nrow(), v.len())?;
        check_block_index(LOC, lookup.nblock_types(), b)?;
        let values: Vec<f64> = lookup.block_rows(b).iter().map(|&g| v[g]).collect();
        Ok(DoubleVector::from(values))
    }

    /// Scatter block vector `w` of block `b` back into `v`.
    ///
    /// `v` is built against the system distribution if it is not yet built.
    pub fn return_block_vector(&self, b: usize, w: &DoubleVector, v: &mut DoubleVector) -> Result<(), KError> {
        const LOC: &str = "BlockPreconditioner::return_block_vector";
        let lookup = self.lookup(LOC)?;
        check_block_index(LOC, lookup.nblock_types(), b)?;
        check_dim(LOC, lookup.block_dimension(b), w.len())?;
        self.ensure_built(v, LOC)?;
        for (&g, &x) in lookup.block_rows(b).iter().zip(w.values()) {
            v[g] = x;
        }
        Ok(())
    }

    /// Split `v` into one vector per block type.
    pub fn get_block_vectors(&self, v: &DoubleVector) -> Result<Vec<DoubleVector>, KError> {
        let n = self.lookup("BlockPreconditioner::get_block_vectors")?.nblock_types();
        (0..n).map(|b| self.get_block_vector(b, v)).collect()
    }

    /// Inverse of [`get_block_vectors`](Self::get_block_vectors).
    pub fn return_block_vectors(&self, ws: &[DoubleVector], v: &mut DoubleVector) -> Result<(), KError> {
        const LOC: &str = "BlockPreconditioner::return_block_vectors";
        let n = self.lookup(LOC)?.nblock_types();
        check_dim(LOC, n, ws.len())?;
        ws.iter()
            .enumerate()
            .try_for_each(|(b, w)| self.return_block_vector(b, w, v))
    }

    /// Permute `v` into block order.
    pub fn get_block_ordered_preconditioner_vector(&self, v: &DoubleVector) -> Result<DoubleVector, KError> {
        const LOC: &str = "BlockPreconditioner::get_block_ordered_preconditioner_vector";
        let lookup = self.lookup(LOC)?;
        check_dim(LOC, lookup.nrow(), v.len())?;
        let values: Vec<f64> = (0..lookup.nblock_types())
            .flat_map(|b| lookup.block_rows(b).iter().map(|&g| v[g]))
            .collect();
        Ok(DoubleVector::from(values))
    }

    /// Inverse of [`get_block_ordered_preconditioner_vector`](Self::get_block_ordered_preconditioner_vector).
    pub fn return_block_ordered_preconditioner_vector(
        &self,
        w: &DoubleVector,
        v: &mut DoubleVector,
    ) -> Result<(), KError> {
        const LOC: &str = "BlockPreconditioner::return_block_ordered_preconditioner_vector";
        let lookup = self.lookup(LOC)?;
        check_dim(LOC, lookup.nrow(), w.len())?;
        self.ensure_built(v, LOC)?;
        for g in 0..lookup.nrow() {
            v[g] = w[lookup.block_ordered_index(g)];
        }
        Ok(())
    }

    /// Build `v` against the system distribution unless it already matches it.
    pub fn ensure_built(&self, v: &mut DoubleVector, location: &'static str) -> Result<(), KError> {
        let dist = self.distribution(location)?;
        if !v.built() || v.len() != dist.nrow_local() {
            v.build(dist, 0.0);
        }
        Ok(())
    }
}

/// Appends block rows one at a time into a single block-ordered CSR matrix.
pub(crate) struct BlockRowAssembler<'a> {
    lookup: &'a BlockLookupScheme,
    next_block_row: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl<'a> BlockRowAssembler<'a> {
    pub(crate) fn new(lookup: &'a BlockLookupScheme) -> Self {
        let mut row_ptr = Vec::with_capacity(lookup.nrow() + 1);
        row_ptr.push(0);
        Self { lookup, next_block_row: 0, row_ptr, col_idx: Vec::new(), values: Vec::new() }
    }

    /// Append block row `i`; rows must arrive in order `0, 1, ...`.
    pub(crate) fn push_block_row(&mut self, i: usize, row: &[Option<CsrMatrix>]) -> Result<(), KError> {
        const LOC: &str = "BlockRowAssembler::push_block_row";
        let n = self.lookup.nblock_types();
        check_dim(LOC, self.next_block_row, i)?;
        check_dim(LOC, n, row.len())?;
        let nrow_i = self.lookup.block_dimension(i);
        for (j, block) in row.iter().enumerate() {
            if let Some(block) = block {
                check_dim(LOC, nrow_i, block.nrows())?;
                check_dim(LOC, self.lookup.block_dimension(j), block.ncols())?;
            }
        }
        for k in 0..nrow_i {
            for (j, block) in row.iter().enumerate() {
                let Some(block) = block else { continue };
                let offset = self.lookup.block_offset(j);
                let (cols, vals) = block.row(k);
                self.col_idx.extend(cols.iter().map(|&c| c + offset));
                self.values.extend_from_slice(vals);
            }
            self.row_ptr.push(self.col_idx.len());
        }
        self.next_block_row += 1;
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<CsrMatrix, KError> {
        check_dim("BlockRowAssembler::finish", self.lookup.nblock_types(), self.next_block_row)?;
        let n = self.lookup.nrow();
        Ok(CsrMatrix::from_csr(n, n, self.row_ptr, self.col_idx, self.values))
    }
}

fn check_dim(location: &'static str, expected: usize, found: usize) -> Result<(), KError> {
    if expected != found {
        return Err(KError::DimensionMismatch { location, expected, found });
    }
    Ok(())
}

fn check_block_index(location: &'static str, nblock: usize, b: usize) -> Result<(), KError> {
    if b >= nblock {
        return Err(KError::DimensionMismatch { location, expected: nblock, found: b });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::mesh::DofTypeMap;

    // 4×4 with dof types [0, 1, 0, 1]
    fn setup_4x4() -> (BlockPreconditioner, CsrMatrix) {
        let a = CsrMatrix::from_dense(&faer::Mat::from_fn(4, 4, |i, j| (10 * i + j) as f64 + 1.0));
        let mut base = BlockPreconditioner::new();
        base.add_mesh(Arc::new(DofTypeMap::from_types(vec![0, 1, 0, 1])));
        base.block_setup(&a).unwrap();
        (base, a)
    }

    #[test]
    fn extracts_interleaved_blocks() {
        let (base, a) = setup_4x4();
        let b01 = base.get_block(&a, 0, 1).unwrap();
        // rows {0,2} × cols {1,3}
        assert_eq!(b01.get(0, 0), a.get(0, 1));
        assert_eq!(b01.get(0, 1), a.get(0, 3));
        assert_eq!(b01.get(1, 0), a.get(2, 1));
        assert_eq!(b01.get(1, 1), a.get(2, 3));
    }

    #[test]
    fn full_assembly_is_block_permutation() {
        let (base, a) = setup_4x4();
        let all = vec![vec![true; 2]; 2];
        let blocks = base.get_blocks(&a, &all).unwrap();
        let p = base.build_preconditioner_matrix(&blocks).unwrap();
        let lookup = base.lookup("test").unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(p.get(lookup.block_ordered_index(i), lookup.block_ordered_index(j)), a.get(i, j));
            }
        }
    }

    #[test]
    fn missing_blocks_assemble_as_zero() {
        let (base, a) = setup_4x4();
        let diag = vec![vec![true, false], vec![false, true]];
        let blocks = base.get_blocks(&a, &diag).unwrap();
        let p = base.build_preconditioner_matrix(&blocks).unwrap();
        assert_eq!(p.get(0, 2), 0.0);
        assert_eq!(p.get(0, 1), a.get(0, 2));
    }

    #[test]
    fn extraction_before_setup_is_an_error() {
        let base = BlockPreconditioner::new();
        let a = CsrMatrix::identity(2);
        assert!(matches!(base.get_block(&a, 0, 0), Err(KError::BlockSetupRequired { .. })));
        let v = DoubleVector::from(vec![1.0, 2.0]);
        assert!(matches!(base.get_block_vectors(&v), Err(KError::BlockSetupRequired { .. })));
    }

    #[test]
    fn wrong_length_vector_is_an_error() {
        let (base, _) = setup_4x4();
        let v = DoubleVector::from(vec![1.0; 3]);
        assert!(matches!(base.get_block_vector(0, &v), Err(KError::DimensionMismatch { .. })));
    }

    #[test]
    fn block_vectors_follow_global_order() {
        let (base, _) = setup_4x4();
        let v = DoubleVector::from(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(base.get_block_vector(0, &v).unwrap().values(), &[1.0, 3.0]);
        assert_eq!(base.get_block_vector(1, &v).unwrap().values(), &[2.0, 4.0]);
        let ordered = base.get_block_ordered_preconditioner_vector(&v).unwrap();
        assert_eq!(ordered.values(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn empty_dof_to_block_map_keeps_default_blocks() {
        let a = CsrMatrix::identity(3);
        let mut base = BlockPreconditioner::new();
        base.add_mesh(Arc::new(DofTypeMap::from_types(vec![0, 1, 2])));
        base.set_dof_to_block_map(&[0, 0, 1]);
        base.set_dof_to_block_map(&[]);
        base.block_setup(&a).unwrap();
        assert_eq!(base.nblock_types(), 3);
    }

    #[test]
    fn dense_matrix_fails_cast() {
        let dense = faer::Mat::<f64>::zeros(2, 2);
        let err = BlockPreconditioner::cast_matrix(&dense, "test").unwrap_err();
        assert!(matches!(err, KError::MatrixType { location: "test" }));
    }
}
