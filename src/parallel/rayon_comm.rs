// rayon-based shared-memory communication

use rayon::prelude::*;

/// Shared-memory "communicator": one process whose block work runs on the
/// global rayon pool.
#[derive(Debug, Clone, Copy)]
pub struct RayonComm;

impl RayonComm {
    /// Size the global pool to the machine (first call wins).
    pub fn new() -> Self {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build_global()
            .ok();
        RayonComm
    }

    /// Worker threads available for block setups and solves.
    pub fn num_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}

impl Default for RayonComm {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Comm for RayonComm {
    // one address space: every block is owned here
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) { rayon::scope(|_| {}); }
    fn all_reduce(&self, x: f64) -> f64 {
        x // No-op for shared memory
    }
    fn all_reduce_sum(&self, _buf: &mut [f64]) {}
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        a.par_iter().zip(b.par_iter()).map(|(&x, &y)| x * y).sum()
    }
}
