// Jacobi preconditioner implementation

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::{CsrMatrix, DoubleVector};
use crate::preconditioner::Preconditioner;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
#[derive(Debug, Clone, Default)]
pub struct Jacobi {
    pub(crate) inv_diag: Vec<f64>,
}

impl Jacobi {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self::default()
    }
}

fn diagonal(matrix: &dyn LinearOperator) -> Vec<f64> {
    let n = matrix.nrows();
    if let Some(csr) = matrix.as_any().downcast_ref::<CsrMatrix>() {
        return (0..n).map(|i| csr.get(i, i)).collect();
    }
    // apply to unit vectors
    let mut diag = vec![0.0; n];
    let mut e = vec![0.0; matrix.ncols()];
    let mut col = vec![0.0; n];
    for (i, d) in diag.iter_mut().enumerate() {
        e[i] = 1.0;
        matrix.apply(&e, &mut col);
        e[i] = 0.0;
        *d = col[i];
    }
    diag
}

impl Preconditioner for Jacobi {
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(KError::FactorError("Jacobi: matrix is not square".into()));
        }
        let diag = diagonal(matrix);
        if let Some(i) = diag.iter().position(|&d| d == 0.0) {
            return Err(KError::ZeroPivot(i));
        }
        self.inv_diag = diag.into_iter().map(|d| 1.0 / d).collect();
        Ok(())
    }

    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError> {
        if r.len() != self.inv_diag.len() {
            return Err(KError::DimensionMismatch {
                location: "Jacobi::preconditioner_solve",
                expected: self.inv_diag.len(),
                found: r.len(),
            });
        }
        z.build_from(r);
        for (zi, d) in z.values_mut().iter_mut().zip(&self.inv_diag) {
            *zi *= d;
        }
        Ok(())
    }

    fn clean_up_memory(&mut self) {
        self.inv_diag = Vec::new();
    }
}
