//! Communicators and the batched two-level dispatch of block solves.
//!
//! A [`Comm`] decides which process owns which diagonal block and combines
//! per-process results with one collective reduction. Within a process the
//! owned blocks are set up and solved on the rayon thread pool (when the
//! `rayon` feature is on).

pub trait Comm: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Global sum of one value.
    fn all_reduce(&self, x: f64) -> f64;
    /// In-place elementwise global sum of `buf`.
    fn all_reduce_sum(&self, buf: &mut [f64]);
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce(local)
    }
}

/// Single process, no communication.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 { x }
    fn all_reduce_sum(&self, _buf: &mut [f64]) {}
}

#[cfg(feature="mpi")]
pub mod mpi_comm;
#[cfg(feature="mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature="rayon")]
pub mod rayon_comm;
#[cfg(feature="rayon")]
pub use rayon_comm::RayonComm;

pub mod preconditioner_array;
pub use preconditioner_array::PreconditionerArray;
