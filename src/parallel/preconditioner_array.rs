//! Batched setup and application of independent block preconditioners.
//!
//! All diagonal blocks are handed over at once. Block `i` is owned by rank
//! `i % size`; each rank sets up and solves only its own blocks (on the rayon
//! pool when available) and a single `all_reduce_sum` over the block-ordered
//! solution gives every rank every block's result.

use crate::error::KError;
use crate::matrix::{CsrMatrix, DoubleVector};
use crate::parallel::{Comm, SerialComm};
use crate::preconditioner::Preconditioner;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::sync::Arc;

pub struct PreconditionerArray {
    comm: Arc<dyn Comm>,
    /// `None` for blocks owned by another rank
    preconditioners: Vec<Option<Box<dyn Preconditioner>>>,
    block_dims: Vec<usize>,
}

impl Default for PreconditionerArray {
    fn default() -> Self {
        Self::new(Arc::new(SerialComm))
    }
}

impl PreconditionerArray {
    pub fn new(comm: Arc<dyn Comm>) -> Self {
        Self { comm, preconditioners: Vec::new(), block_dims: Vec::new() }
    }

    /// Number of blocks (owned or not).
    pub fn nprec(&self) -> usize {
        self.block_dims.len()
    }

    /// Number of blocks owned by this rank.
    pub fn nprec_local(&self) -> usize {
        self.preconditioners.iter().filter(|p| p.is_some()).count()
    }

    /// Set up `preconditioners[i]` on `blocks[i]` for every block owned here.
    ///
    /// Preconditioners of blocks owned elsewhere are dropped unused; all blocks
    /// are dropped on return.
    ///
    /// Collective: every rank reduces a failure count before returning, so a
    /// setup failure on any rank is an error on all of them. Ranks whose own
    /// blocks succeeded return [`KError::RemoteSetupFailed`] and keep nothing.
    pub fn setup_preconditioners(
        &mut self,
        blocks: Vec<CsrMatrix>,
        preconditioners: Vec<Box<dyn Preconditioner>>,
    ) -> Result<(), KError> {
        self.clean_up_memory();
        if blocks.len() != preconditioners.len() {
            return Err(KError::DimensionMismatch {
                location: "PreconditionerArray::setup_preconditioners",
                expected: blocks.len(),
                found: preconditioners.len(),
            });
        }
        let (rank, size) = (self.comm.rank(), self.comm.size().max(1));
        let mut owned: Vec<Option<Box<dyn Preconditioner>>> = preconditioners
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i % size == rank).then_some(p))
            .collect();

        let setup_one = |i: usize, p: &mut Option<Box<dyn Preconditioner>>, block: &CsrMatrix| match p {
            Some(p) => p.setup(block).map_err(|e| KError::subsidiary(i, e)),
            None => Ok(()),
        };
        #[cfg(feature = "rayon")]
        let local = owned
            .par_iter_mut()
            .zip(blocks.par_iter())
            .enumerate()
            .try_for_each(|(i, (p, block))| setup_one(i, p, block));
        #[cfg(not(feature = "rayon"))]
        let local = owned
            .iter_mut()
            .zip(blocks.iter())
            .enumerate()
            .try_for_each(|(i, (p, block))| setup_one(i, p, block));

        // all ranks must reach this reduction, even after a local failure
        let nfailed = self.comm.all_reduce(if local.is_err() { 1.0 } else { 0.0 }).round() as usize;
        if let Err(e) = local {
            log::warn!("preconditioner array: setup failed on rank {rank}: {e}");
            return Err(e);
        }
        if nfailed > 0 {
            return Err(KError::RemoteSetupFailed { location: "PreconditionerArray::setup_preconditioners", nfailed });
        }

        log::debug!(
            "preconditioner array: rank {} of {} set up {} of {} blocks",
            rank,
            size,
            owned.iter().filter(|p| p.is_some()).count(),
            blocks.len()
        );
        self.block_dims = blocks.iter().map(CsrMatrix::nrows).collect();
        self.preconditioners = owned;
        Ok(())
    }

    /// Apply every block preconditioner: `z[i] = P_i⁻¹ r[i]`.
    pub fn solve_preconditioners(&self, r: &[DoubleVector]) -> Result<Vec<DoubleVector>, KError> {
        const LOC: &str = "PreconditionerArray::solve_preconditioners";
        if self.block_dims.is_empty() && !r.is_empty() {
            return Err(KError::BlockSetupRequired { location: LOC });
        }
        if r.len() != self.block_dims.len() {
            return Err(KError::DimensionMismatch { location: LOC, expected: self.block_dims.len(), found: r.len() });
        }
        if let Some((dim, r_i)) = self.block_dims.iter().zip(r).find(|(d, r_i)| **d != r_i.len()) {
            return Err(KError::DimensionMismatch { location: LOC, expected: *dim, found: r_i.len() });
        }

        let solve_one = |i: usize, p: &dyn Preconditioner, r_i: &DoubleVector| {
            let mut z_i = DoubleVector::new();
            p.preconditioner_solve(r_i, &mut z_i)
                .map_err(|e| KError::subsidiary(i, e))
                .map(|_| (i, z_i))
        };
        #[cfg(feature = "rayon")]
        let solved: Vec<(usize, DoubleVector)> = self
            .preconditioners
            .par_iter()
            .zip(r.par_iter())
            .enumerate()
            .filter_map(|(i, (p, r_i))| p.as_deref().map(|p| solve_one(i, p, r_i)))
            .collect::<Result<_, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let solved: Vec<(usize, DoubleVector)> = self
            .preconditioners
            .iter()
            .zip(r.iter())
            .enumerate()
            .filter_map(|(i, (p, r_i))| p.as_deref().map(|p| solve_one(i, p, r_i)))
            .collect::<Result<_, _>>()?;

        let mut offsets = Vec::with_capacity(self.block_dims.len() + 1);
        offsets.push(0);
        for d in &self.block_dims {
            offsets.push(offsets[offsets.len() - 1] + d);
        }
        let mut buf = vec![0.0; offsets[self.block_dims.len()]];
        for (i, z_i) in solved {
            if z_i.len() != self.block_dims[i] {
                return Err(KError::subsidiary(
                    i,
                    KError::DimensionMismatch { location: LOC, expected: self.block_dims[i], found: z_i.len() },
                ));
            }
            buf[offsets[i]..offsets[i + 1]].copy_from_slice(z_i.values());
        }

        // one collective for all blocks
        self.comm.all_reduce_sum(&mut buf);

        Ok(offsets
            .windows(2)
            .map(|w| DoubleVector::from(buf[w[0]..w[1]].to_vec()))
            .collect())
    }

    pub fn clean_up_memory(&mut self) {
        self.preconditioners.clear();
        self.block_dims.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::LuPreconditioner;

    fn lu() -> Box<dyn Preconditioner> {
        Box::new(LuPreconditioner::new())
    }

    #[test]
    fn solves_every_block_serially() {
        let blocks = vec![
            CsrMatrix::from_triplets(1, 1, &[(0, 0, 2.0)]),
            CsrMatrix::from_triplets(2, 2, &[(0, 0, 4.0), (1, 1, 5.0)]),
        ];
        let mut array = PreconditionerArray::default();
        array.setup_preconditioners(blocks, vec![lu(), lu()]).unwrap();
        assert_eq!(array.nprec_local(), 2);
        let r = vec![DoubleVector::from(vec![2.0]), DoubleVector::from(vec![8.0, 10.0])];
        let z = array.solve_preconditioners(&r).unwrap();
        assert!((z[0][0] - 1.0).abs() < 1e-14);
        assert!((z[1][0] - 2.0).abs() < 1e-14);
        assert!((z[1][1] - 2.0).abs() < 1e-14);
    }

    /// Rank 1 of 2: owns only odd blocks and relies on the reduction for the rest.
    struct SecondOfTwo;
    impl Comm for SecondOfTwo {
        fn rank(&self) -> usize { 1 }
        fn size(&self) -> usize { 2 }
        fn barrier(&self) {}
        fn all_reduce(&self, x: f64) -> f64 { x }
        fn all_reduce_sum(&self, _buf: &mut [f64]) {}
    }

    #[test]
    fn round_robin_ownership() {
        let blocks = (0..3).map(|_| CsrMatrix::identity(1)).collect();
        let mut array = PreconditionerArray::new(Arc::new(SecondOfTwo));
        array.setup_preconditioners(blocks, vec![lu(), lu(), lu()]).unwrap();
        assert_eq!(array.nprec(), 3);
        assert_eq!(array.nprec_local(), 1);
        let r: Vec<_> = (0..3).map(|i| DoubleVector::from(vec![i as f64 + 1.0])).collect();
        let z = array.solve_preconditioners(&r).unwrap();
        // without peers the unowned blocks stay zero
        assert_eq!(z[0][0], 0.0);
        assert_eq!(z[1][0], 2.0);
        assert_eq!(z[2][0], 0.0);
    }

    /// Rank 0 of 2 whose peer reports one failed setup.
    struct PeerFailed;
    impl Comm for PeerFailed {
        fn rank(&self) -> usize { 0 }
        fn size(&self) -> usize { 2 }
        fn barrier(&self) {}
        fn all_reduce(&self, x: f64) -> f64 { x + 1.0 }
        fn all_reduce_sum(&self, _buf: &mut [f64]) {}
    }

    #[test]
    fn failure_on_another_rank_fails_every_rank() {
        let blocks = (0..2).map(|_| CsrMatrix::identity(1)).collect();
        let mut array = PreconditionerArray::new(Arc::new(PeerFailed));
        let err = array.setup_preconditioners(blocks, vec![lu(), lu()]).unwrap_err();
        assert!(matches!(err, KError::RemoteSetupFailed { nfailed: 1, .. }));
        assert_eq!(array.nprec(), 0);
        assert!(array.solve_preconditioners(&[DoubleVector::from(vec![1.0])]).is_err());
    }

    #[test]
    fn local_failure_is_reported_as_is() {
        let blocks = vec![CsrMatrix::identity(1), CsrMatrix::zeros(1, 2)];
        let mut array = PreconditionerArray::default();
        let err = array.setup_preconditioners(blocks, vec![lu(), lu()]).unwrap_err();
        assert!(matches!(err, KError::Subsidiary { block: 1, .. }));
        assert_eq!(array.nprec_local(), 0);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let mut array = PreconditionerArray::default();
        let err = array.setup_preconditioners(vec![CsrMatrix::identity(1)], vec![]).unwrap_err();
        assert!(matches!(err, KError::DimensionMismatch { .. }));
    }
}
