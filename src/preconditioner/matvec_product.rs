// Multiply-only operator wrapping one off-diagonal block.

use crate::error::KError;
use crate::matrix::{CsrMatrix, Distribution, DoubleVector};

/// y = A x for a block that is only ever multiplied, never solved.
#[derive(Debug, Clone, Default)]
pub struct MatrixVectorProduct {
    matrix: Option<CsrMatrix>,
}

impl MatrixVectorProduct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `matrix` as the operator.
    pub fn setup(&mut self, matrix: CsrMatrix) {
        self.matrix = Some(matrix);
    }

    pub fn nrows(&self) -> usize {
        self.matrix.as_ref().map_or(0, CsrMatrix::nrows)
    }

    pub fn ncols(&self) -> usize {
        self.matrix.as_ref().map_or(0, CsrMatrix::ncols)
    }

    /// y = A x; `y` is rebuilt to the operator's row count.
    pub fn multiply(&self, x: &DoubleVector, y: &mut DoubleVector) -> Result<(), KError> {
        let a = self
            .matrix
            .as_ref()
            .ok_or_else(|| KError::SolveError("MatrixVectorProduct: multiply called before setup".into()))?;
        if x.len() != a.ncols() {
            return Err(KError::DimensionMismatch {
                location: "MatrixVectorProduct::multiply",
                expected: a.ncols(),
                found: x.len(),
            });
        }
        y.build(Distribution::serial(a.nrows()), 0.0);
        #[cfg(feature = "rayon")]
        a.spmv_parallel(x.values(), y.values_mut());
        #[cfg(not(feature = "rayon"))]
        a.spmv(x.values(), y.values_mut());
        Ok(())
    }

    pub fn clean_up_memory(&mut self) {
        self.matrix = None;
    }
}
