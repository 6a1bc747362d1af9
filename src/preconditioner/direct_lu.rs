//! Direct dense solve as a preconditioner, using Faer's LU factorization.
//!
//! This is the default subsidiary preconditioner of every block strategy: each
//! block is copied to dense storage and factorized with full pivoting, after
//! which `preconditioner_solve` is an exact solve. Suitable for the small to
//! medium blocks that come out of a block decomposition.
//!
//! # References
//! - Faer documentation: https://github.com/sarah-ek/faer-rs
//! - Golub & Van Loan, Matrix Computations

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::{CsrMatrix, DoubleVector};
use crate::preconditioner::Preconditioner;
use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

/// Dense copy of any operator: CSR and dense matrices directly, anything else
/// column by column through `apply`.
pub(crate) fn dense_copy(matrix: &dyn LinearOperator) -> Mat<f64> {
    if let Some(csr) = matrix.as_any().downcast_ref::<CsrMatrix>() {
        return csr.to_dense();
    }
    if let Some(dense) = matrix.as_any().downcast_ref::<Mat<f64>>() {
        return dense.clone();
    }
    let (m, n) = (matrix.nrows(), matrix.ncols());
    let mut dense = Mat::<f64>::zeros(m, n);
    let mut e = vec![0.0; n];
    let mut col = vec![0.0; m];
    for j in 0..n {
        e[j] = 1.0;
        matrix.apply(&e, &mut col);
        e[j] = 0.0;
        for i in 0..m {
            dense[(i, j)] = col[i];
        }
    }
    dense
}

/// LU preconditioner using full pivoting from Faer.
///
/// Stores the LU factorization for reuse across solves.
#[derive(Default)]
pub struct LuPreconditioner {
    /// Cached LU factorization (if computed)
    factor: Option<FullPivLu<f64>>,
    n: usize,
}

impl LuPreconditioner {
    /// Create a new LU preconditioner (no factorization yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a factorization is held.
    pub fn is_factorized(&self) -> bool {
        self.factor.is_some()
    }

    /// Order of the factorized matrix.
    pub fn nrows(&self) -> usize {
        self.n
    }
}

impl Preconditioner for LuPreconditioner {
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError> {
        self.clean_up_memory();
        if matrix.nrows() != matrix.ncols() {
            return Err(KError::FactorError(format!(
                "LuPreconditioner: matrix is {}x{}, not square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let dense = dense_copy(matrix);
        // Compute LU factorization (overwrites any previous factor)
        self.factor = Some(FullPivLu::new(dense.as_ref()));
        self.n = matrix.nrows();
        Ok(())
    }

    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError> {
        let factor = self.factor.as_ref().ok_or_else(|| {
            KError::SolveError("LuPreconditioner: preconditioner_solve called before setup".into())
        })?;
        if r.len() != self.n {
            return Err(KError::DimensionMismatch {
                location: "LuPreconditioner::preconditioner_solve",
                expected: self.n,
                found: r.len(),
            });
        }
        // Copy r into z, then solve in place: z = A^{-1} r
        z.build_from(r);
        let n = z.len();
        let z_mat = MatMut::from_column_major_slice_mut(z.values_mut(), n, 1);
        factor.solve_in_place_with_conj(Conj::No, z_mat);
        if let Some(i) = z.values().iter().position(|v| !v.is_finite()) {
            return Err(KError::SolveError(format!(
                "LuPreconditioner: non-finite solution entry {i} (singular block?)"
            )));
        }
        Ok(())
    }

    fn clean_up_memory(&mut self) {
        self.factor = None;
        self.n = 0;
    }
}
