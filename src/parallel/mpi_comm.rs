//! MPI-based parallel communication module.
//!
//! Provides an implementation of the `Comm` trait on top of MPI, so the
//! two-level dispatch of block solves can spread diagonal blocks across
//! processes. Only available when the `mpi` feature is enabled.
//!
//! The caller owns the MPI `Universe`; `MpiComm` records rank and size and
//! issues its collectives on the world communicator.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")] {
//! use kryst_block::parallel::{Comm, MpiComm};
//! use mpi::traits::*;
//! let universe = mpi::initialize().expect("MPI already initialized");
//! let comm = MpiComm::new(&universe.world());
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier();
//! # }
//! ```

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// Rank and size of this process within the world communicator.
#[derive(Debug, Clone, Copy)]
pub struct MpiComm {
    /// The rank (ID) of this process within the communicator.
    rank: usize,
    /// The total number of processes in the communicator.
    size: usize,
}

impl MpiComm {
    /// Capture rank and size of an initialized world communicator.
    pub fn new(world: &SimpleCommunicator) -> Self {
        MpiComm {
            rank: world.rank() as usize,
            size: world.size() as usize,
        }
    }

    fn world() -> SimpleCommunicator {
        SimpleCommunicator::world()
    }
}

impl super::Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize { self.rank }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize { self.size }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) { Self::world().barrier(); }

    /// Performs an all-reduce sum operation across all processes.
    fn all_reduce(&self, x: f64) -> f64 {
        let mut y = x;
        Self::world().all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }

    /// Elementwise all-reduce sum of a buffer, result left in `buf` on every rank.
    fn all_reduce_sum(&self, buf: &mut [f64]) {
        let send = buf.to_vec();
        Self::world().all_reduce_into(&send[..], buf, &SystemOperation::sum());
    }
}
