// Compressed sparse row matrix: the concrete block-capable matrix type.

use crate::core::traits::{LinearOperator, MatVec};
use crate::matrix::vector::{Distribution, DoubleVector};
use faer::Mat;
use std::any::Any;

/// Square or rectangular CSR matrix of `f64` values.
///
/// Column indices within a row are kept in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    distribution: Distribution,
}

impl CsrMatrix {
    /// Build a CSR from raw row-ptr, col-idx, and values.
    ///
    /// Columns within each row are sorted; the arrays are otherwise taken as given.
    ///
    /// # Panics
    /// Panics if the arrays are inconsistent with `nrows`/`ncols`.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        assert_eq!(row_ptr.len(), nrows + 1, "row_ptr must have nrows + 1 entries");
        assert_eq!(col_idx.len(), values.len(), "col_idx and values differ in length");
        assert_eq!(row_ptr[nrows], col_idx.len(), "row_ptr[nrows] must equal nnz");
        assert!(row_ptr.windows(2).all(|w| w[0] <= w[1]), "row_ptr must be non-decreasing");
        assert!(col_idx.iter().all(|&j| j < ncols), "column index out of range");

        let mut m = Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
            distribution: Distribution::serial(nrows),
        };
        m.sort_rows();
        m
    }

    /// Build from `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); nrows];
        for &(i, j, v) in triplets {
            assert!(i < nrows && j < ncols, "triplet ({i}, {j}) out of range");
            rows[i].push((j, v));
        }
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        row_ptr.push(0);
        for mut row in rows {
            row.sort_by_key(|&(j, _)| j);
            for (j, v) in row {
                if col_idx.len() > *row_ptr.last().unwrap_or(&0) && col_idx.last() == Some(&j) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    col_idx.push(j);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }
        Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
            distribution: Distribution::serial(nrows),
        }
    }

    /// Build from a dense faer matrix, keeping only nonzero entries.
    pub fn from_dense(a: &Mat<f64>) -> Self {
        let mut triplets = Vec::new();
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                let v = a[(i, j)];
                if v != 0.0 {
                    triplets.push((i, j, v));
                }
            }
        }
        Self::from_triplets(a.nrows(), a.ncols(), &triplets)
    }

    /// n×n identity.
    pub fn identity(n: usize) -> Self {
        Self::from_csr(n, n, (0..=n).collect(), (0..n).collect(), vec![1.0; n])
    }

    /// An `nrows × ncols` matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::from_csr(nrows, ncols, vec![0; nrows + 1], Vec::new(), Vec::new())
    }

    /// Attach a row distribution.
    ///
    /// # Panics
    /// Panics if `dist` does not describe `nrows` global rows.
    pub fn with_distribution(mut self, dist: Distribution) -> Self {
        assert_eq!(dist.nrow(), self.nrows, "distribution does not match row count");
        self.distribution = dist;
        self
    }

    pub fn nrows(&self) -> usize { self.nrows }
    pub fn ncols(&self) -> usize { self.ncols }
    pub fn nnz(&self) -> usize { self.values.len() }
    pub fn row_ptr(&self) -> &[usize] { &self.row_ptr }
    pub fn col_idx(&self) -> &[usize] { &self.col_idx }
    pub fn values(&self) -> &[f64] { &self.values }
    pub fn distribution(&self) -> Distribution { self.distribution }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.row_ptr[i], self.row_ptr[i + 1]);
        (&self.col_idx[start..end], &self.values[start..end])
    }

    /// Entry `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (cols, vals) = self.row(i);
        match cols.binary_search(&j) {
            Ok(k) => vals[k],
            Err(_) => 0.0,
        }
    }

    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    pub fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols, "Input vector x has incorrect length");
        assert_eq!(y.len(), self.nrows, "Output vector y has incorrect length");
        for (i, yi) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum();
        }
    }

    /// Dense copy, for factorization by faer.
    pub fn to_dense(&self) -> Mat<f64> {
        let mut dense = Mat::<f64>::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                dense[(i, j)] = v;
            }
        }
        dense
    }

    fn sort_rows(&mut self) {
        for i in 0..self.nrows {
            let (start, end) = (self.row_ptr[i], self.row_ptr[i + 1]);
            if self.col_idx[start..end].windows(2).all(|w| w[0] <= w[1]) {
                continue;
            }
            let mut row: Vec<(usize, f64)> = self.col_idx[start..end]
                .iter()
                .copied()
                .zip(self.values[start..end].iter().copied())
                .collect();
            row.sort_by_key(|&(j, _)| j);
            for (k, (j, v)) in row.into_iter().enumerate() {
                self.col_idx[start + k] = j;
                self.values[start + k] = v;
            }
        }
    }
}

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
impl CsrMatrix {
    /// Parallel SpMV using Rayon
    pub fn spmv_parallel(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum();
        });
    }
}

impl MatVec<DoubleVector> for CsrMatrix {
    /// `y` is (re)built to this matrix's row distribution when its length is wrong.
    fn matvec(&self, x: &DoubleVector, y: &mut DoubleVector) {
        if y.len() != self.nrows {
            y.build(self.distribution, 0.0);
        }
        self.spmv(x.values(), y.values_mut());
    }
}

impl LinearOperator for CsrMatrix {
    fn nrows(&self) -> usize { self.nrows }
    fn ncols(&self) -> usize { self.ncols }
    fn distribution(&self) -> Distribution { self.distribution }
    fn apply(&self, x: &[f64], y: &mut [f64]) { self.spmv(x, y) }
    fn as_any(&self) -> &dyn Any { self }
}
