//! ILU(0) factorization with zero fill (Saad §10.3), on the CSR pattern of the matrix.

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::{CsrMatrix, DoubleVector};
use crate::preconditioner::Preconditioner;

/// Incomplete LU with the sparsity pattern of A.
///
/// L (unit lower) and U share the storage of the factorized copy of A.
#[derive(Debug, Clone, Default)]
pub struct Ilu0 {
    lu: Option<CsrMatrix>,
    diag_pos: Vec<usize>,
}

impl Ilu0 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preconditioner for Ilu0 {
    fn setup(&mut self, matrix: &dyn LinearOperator) -> Result<(), KError> {
        self.clean_up_memory();
        let a = match matrix.as_any().downcast_ref::<CsrMatrix>() {
            Some(a) => a.clone(),
            None => CsrMatrix::from_dense(&crate::preconditioner::direct_lu::dense_copy(matrix)),
        };
        if a.nrows() != a.ncols() {
            return Err(KError::FactorError("Ilu0: matrix is not square".into()));
        }
        let n = a.nrows();
        let row_ptr = a.row_ptr().to_vec();
        let col_idx = a.col_idx().to_vec();
        let mut vals = a.values().to_vec();

        let mut diag_pos = Vec::with_capacity(n);
        for i in 0..n {
            let row = &col_idx[row_ptr[i]..row_ptr[i + 1]];
            let k = row.binary_search(&i).map_err(|_| KError::ZeroPivot(i))?;
            diag_pos.push(row_ptr[i] + k);
        }

        // IKJ variant restricted to the pattern
        for i in 1..n {
            for kk in row_ptr[i]..row_ptr[i + 1] {
                let k = col_idx[kk];
                if k >= i {
                    break;
                }
                let pivot = vals[diag_pos[k]];
                if pivot == 0.0 {
                    return Err(KError::ZeroPivot(k));
                }
                vals[kk] /= pivot;
                let l_ik = vals[kk];
                let row_k = &col_idx[row_ptr[k]..row_ptr[k + 1]];
                for jj in (kk + 1)..row_ptr[i + 1] {
                    let j = col_idx[jj];
                    if let Ok(p) = row_k.binary_search(&j) {
                        vals[jj] -= l_ik * vals[row_ptr[k] + p];
                    }
                }
            }
        }
        if let Some(i) = (0..n).find(|&i| vals[diag_pos[i]] == 0.0) {
            return Err(KError::ZeroPivot(i));
        }

        self.lu = Some(CsrMatrix::from_csr(n, n, row_ptr, col_idx, vals));
        self.diag_pos = diag_pos;
        Ok(())
    }

    fn preconditioner_solve(&self, r: &DoubleVector, z: &mut DoubleVector) -> Result<(), KError> {
        let lu = self
            .lu
            .as_ref()
            .ok_or_else(|| KError::SolveError("Ilu0: preconditioner_solve called before setup".into()))?;
        let n = lu.nrows();
        if r.len() != n {
            return Err(KError::DimensionMismatch {
                location: "Ilu0::preconditioner_solve",
                expected: n,
                found: r.len(),
            });
        }
        let (row_ptr, col_idx, vals) = (lu.row_ptr(), lu.col_idx(), lu.values());
        z.build_from(r);
        let y = z.values_mut();
        // solve L y = r
        for i in 0..n {
            for kk in row_ptr[i]..self.diag_pos[i] {
                y[i] -= vals[kk] * y[col_idx[kk]];
            }
        }
        // solve U z = y
        for i in (0..n).rev() {
            for kk in (self.diag_pos[i] + 1)..row_ptr[i + 1] {
                y[i] -= vals[kk] * y[col_idx[kk]];
            }
            y[i] /= vals[self.diag_pos[i]];
        }
        Ok(())
    }

    fn clean_up_memory(&mut self) {
        self.lu = None;
        self.diag_pos.clear();
    }
}
