//! Block lookup scheme: global equation ↔ (block type, index in block).

use crate::block::mesh::DofClassifier;
use crate::error::KError;
use std::sync::Arc;

const LOCATION: &str = "BlockLookupScheme::build";

/// Mapping between global equations and block-local positions.
///
/// Block-local positions follow increasing global equation number, so block
/// vectors and blocks keep the relative ordering of the global system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLookupScheme {
    ndof_types: usize,
    dof_to_block: Vec<usize>,
    block_number: Vec<usize>,
    index_in_block: Vec<usize>,
    block_rows: Vec<Vec<usize>>,
    block_offsets: Vec<usize>,
}

impl BlockLookupScheme {
    /// Classify all `nrow` equations of the system.
    ///
    /// DOF types of mesh `m` are offset by the DOF type count of meshes `0..m`.
    /// Without `dof_to_block`, or with an empty one, each DOF type forms its own block.
    pub fn build(
        nrow: usize,
        meshes: &[Arc<dyn DofClassifier>],
        dof_to_block: Option<&[usize]>,
    ) -> Result<Self, KError> {
        if meshes.is_empty() {
            return Err(KError::NoMeshes { location: LOCATION });
        }

        // global dof type of every equation
        let mut dof_type: Vec<Option<usize>> = vec![None; nrow];
        let mut offset = 0;
        for (m, mesh) in meshes.iter().enumerate() {
            let ntypes = mesh.ndof_types();
            for (eqn, t) in mesh.describe_dofs() {
                if eqn >= nrow {
                    return Err(KError::InvalidMesh {
                        location: LOCATION,
                        mesh: m,
                        reason: format!("equation {eqn} is outside the {nrow}-row system"),
                    });
                }
                if t >= ntypes {
                    return Err(KError::InvalidMesh {
                        location: LOCATION,
                        mesh: m,
                        reason: format!("dof type {t} but only {ntypes} dof types declared"),
                    });
                }
                if dof_type[eqn].is_some() {
                    return Err(KError::DuplicateDof { location: LOCATION, eqn });
                }
                dof_type[eqn] = Some(offset + t);
            }
            offset += ntypes;
        }
        let ndof_types = offset;

        let dof_to_block = match dof_to_block.filter(|map| !map.is_empty()) {
            Some(map) => {
                validate_dof_to_block_map(map, ndof_types)?;
                map.to_vec()
            }
            None => (0..ndof_types).collect(),
        };
        let nblock_types = dof_to_block.iter().copied().max().map_or(0, |b| b + 1);

        let mut block_number = Vec::with_capacity(nrow);
        let mut index_in_block = Vec::with_capacity(nrow);
        let mut block_rows = vec![Vec::new(); nblock_types];
        for (eqn, t) in dof_type.into_iter().enumerate() {
            let t = t.ok_or(KError::UnclassifiedDof { location: LOCATION, eqn })?;
            let b = dof_to_block[t];
            block_number.push(b);
            index_in_block.push(block_rows[b].len());
            block_rows[b].push(eqn);
        }

        let mut block_offsets = Vec::with_capacity(nblock_types + 1);
        block_offsets.push(0);
        for rows in &block_rows {
            block_offsets.push(block_offsets[block_offsets.len() - 1] + rows.len());
        }

        log::trace!(
            "block lookup: {} equations, {} dof types, block sizes {:?}",
            nrow,
            ndof_types,
            block_rows.iter().map(Vec::len).collect::<Vec<_>>()
        );

        Ok(Self { ndof_types, dof_to_block, block_number, index_in_block, block_rows, block_offsets })
    }

    /// Number of global equations.
    pub fn nrow(&self) -> usize {
        self.block_number.len()
    }

    pub fn ndof_types(&self) -> usize {
        self.ndof_types
    }

    pub fn nblock_types(&self) -> usize {
        self.block_rows.len()
    }

    pub fn dof_to_block_map(&self) -> &[usize] {
        &self.dof_to_block
    }

    /// Number of equations in block `b`.
    pub fn block_dimension(&self, b: usize) -> usize {
        self.block_rows[b].len()
    }

    /// Block type of global equation `eqn`.
    pub fn block_number(&self, eqn: usize) -> usize {
        self.block_number[eqn]
    }

    /// Position of global equation `eqn` within its block.
    pub fn index_in_block(&self, eqn: usize) -> usize {
        self.index_in_block[eqn]
    }

    /// Global equations of block `b`, in block-local order.
    pub fn block_rows(&self, b: usize) -> &[usize] {
        &self.block_rows[b]
    }

    /// Global equation at position `k` of block `b`.
    pub fn global_index(&self, b: usize, k: usize) -> usize {
        self.block_rows[b][k]
    }

    /// Start of block `b` in a block-ordered vector.
    pub fn block_offset(&self, b: usize) -> usize {
        self.block_offsets[b]
    }

    /// Position of global equation `eqn` in a block-ordered vector.
    pub fn block_ordered_index(&self, eqn: usize) -> usize {
        self.block_offsets[self.block_number[eqn]] + self.index_in_block[eqn]
    }
}

fn validate_dof_to_block_map(map: &[usize], ndof_types: usize) -> Result<(), KError> {
    if map.len() != ndof_types {
        return Err(KError::InvalidDofToBlockMap {
            location: LOCATION,
            reason: format!("{} entries for {} dof types", map.len(), ndof_types),
        });
    }
    let nblock_types = map.iter().copied().max().map_or(0, |b| b + 1);
    let mut used = vec![false; nblock_types];
    map.iter().for_each(|&b| used[b] = true);
    if let Some(b) = used.iter().position(|&u| !u) {
        return Err(KError::InvalidDofToBlockMap {
            location: LOCATION,
            reason: format!("block type {b} has no dof types (block types must be contiguous)"),
        });
    }
    Ok(())
}
