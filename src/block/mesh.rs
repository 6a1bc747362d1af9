//! DOF classification supplied by the finite-element layer.
//!
//! A block preconditioner never looks at elements or geometry. All it needs
//! from a mesh is, for every unknown the mesh touches, the global equation
//! number and the mesh-local DOF type (velocity, pressure, ...). Several
//! meshes may be added; their DOF types are numbered consecutively in the
//! order the meshes were added.

/// Per-unknown DOF classification of one mesh.
pub trait DofClassifier: Send + Sync {
    /// Number of DOF types this mesh distinguishes.
    fn ndof_types(&self) -> usize;

    /// `(global equation, dof type)` for every unknown classified by this mesh.
    ///
    /// Each global equation should appear at most once.
    fn describe_dofs(&self) -> Vec<(usize, usize)>;
}

/// Explicit DOF classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofTypeMap {
    ndof_types: usize,
    dofs: Vec<(usize, usize)>,
}

impl DofTypeMap {
    /// Classify equations `0..dof_types.len()`, equation `k` having type `dof_types[k]`.
    ///
    /// The number of DOF types is one more than the largest type present.
    pub fn from_types(dof_types: Vec<usize>) -> Self {
        let ndof_types = dof_types.iter().copied().max().map_or(0, |t| t + 1);
        let dofs = dof_types.into_iter().enumerate().collect();
        Self { ndof_types, dofs }
    }

    /// Classify an arbitrary set of `(global equation, dof type)` pairs.
    pub fn new(ndof_types: usize, dofs: Vec<(usize, usize)>) -> Self {
        Self { ndof_types, dofs }
    }

    /// Contiguous ranges: `sizes[t]` consecutive equations of type `t`, starting at 0.
    pub fn from_block_sizes(sizes: &[usize]) -> Self {
        let dof_types = sizes
            .iter()
            .enumerate()
            .flat_map(|(t, &n)| std::iter::repeat_n(t, n))
            .collect();
        Self { ndof_types: sizes.len(), ..Self::from_types(dof_types) }
    }
}

impl DofClassifier for DofTypeMap {
    fn ndof_types(&self) -> usize {
        self.ndof_types
    }

    fn describe_dofs(&self) -> Vec<(usize, usize)> {
        self.dofs.clone()
    }
}
