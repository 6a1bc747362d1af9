//! Distributed vectors and row distributions.
//!
//! A `DoubleVector` is either *unbuilt* (no distribution, no storage) or *built*
//! against a `Distribution`. Preconditioners build their output vectors on
//! demand, mirroring the way iterative solvers hand in empty work vectors.

use std::ops::{Index, IndexMut, SubAssign};

/// Row distribution of a matrix or vector.
///
/// `first_row .. first_row + nrow_local` is the slice of the `nrow` global rows
/// held by this process. Serial distributions hold every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution {
    nrow: usize,
    first_row: usize,
    nrow_local: usize,
}

impl Distribution {
    /// Distribution holding all `nrow` rows on this process.
    pub fn serial(nrow: usize) -> Self {
        Self { nrow, first_row: 0, nrow_local: nrow }
    }

    /// Distribution holding rows `first_row .. first_row + nrow_local` of `nrow`.
    ///
    /// # Panics
    /// Panics if the local slice runs past the global row count.
    pub fn new(nrow: usize, first_row: usize, nrow_local: usize) -> Self {
        assert!(first_row + nrow_local <= nrow, "local rows exceed global row count");
        Self { nrow, first_row, nrow_local }
    }

    pub fn nrow(&self) -> usize { self.nrow }
    pub fn first_row(&self) -> usize { self.first_row }
    pub fn nrow_local(&self) -> usize { self.nrow_local }

    /// True if every row lives on this process.
    pub fn is_serial(&self) -> bool {
        self.first_row == 0 && self.nrow_local == self.nrow
    }
}

/// A vector of `f64` values that may be built against a `Distribution`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoubleVector {
    distribution: Option<Distribution>,
    values: Vec<f64>,
}

impl DoubleVector {
    /// An unbuilt vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// A vector built against `dist` with every local entry set to `value`.
    pub fn with_distribution(dist: Distribution, value: f64) -> Self {
        let mut v = Self::new();
        v.build(dist, value);
        v
    }

    /// (Re)build against `dist`, setting every local entry to `value`.
    pub fn build(&mut self, dist: Distribution, value: f64) {
        self.values.clear();
        self.values.resize(dist.nrow_local(), value);
        self.distribution = Some(dist);
    }

    /// (Re)build as a copy of `other`.
    pub fn build_from(&mut self, other: &DoubleVector) {
        self.distribution = other.distribution;
        self.values.clone_from(&other.values);
    }

    /// Drop storage and distribution.
    pub fn clear(&mut self) {
        self.values = Vec::new();
        self.distribution = None;
    }

    pub fn built(&self) -> bool {
        self.distribution.is_some()
    }

    pub fn distribution(&self) -> Option<Distribution> {
        self.distribution
    }

    /// Number of locally stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Fill every entry with `value`, keeping the distribution.
    pub fn initialise(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v = value);
    }
}

impl From<Vec<f64>> for DoubleVector {
    /// Serial vector owning `values`.
    fn from(values: Vec<f64>) -> Self {
        Self { distribution: Some(Distribution::serial(values.len())), values }
    }
}

impl AsRef<[f64]> for DoubleVector {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

impl AsMut<[f64]> for DoubleVector {
    fn as_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

impl Index<usize> for DoubleVector {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for DoubleVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

impl SubAssign<&DoubleVector> for DoubleVector {
    /// Elementwise `self -= rhs`.
    ///
    /// # Panics
    /// Panics if the vectors have different lengths.
    fn sub_assign(&mut self, rhs: &DoubleVector) {
        assert_eq!(self.len(), rhs.len(), "DoubleVector -= with mismatched lengths");
        for (a, b) in self.values.iter_mut().zip(rhs.values.iter()) {
            *a -= *b;
        }
    }
}
