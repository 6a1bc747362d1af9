//! Command-line or API options for block preconditioners.
//!
//! This module provides the `BlockPcOptions` struct, which selects a block
//! strategy and its parameters either directly or from PETSc-style arguments:
//!
//! ```text
//! -pc_block_type triangular -pc_block_lower -pc_block_sub_type ilu0
//! ```
//!
//! Recognized options:
//!
//! | option                      | value                                   |
//! |-----------------------------|-----------------------------------------|
//! | `-pc_block_type`            | `diagonal`, `triangular`, `exact`, `dummy` |
//! | `-pc_block_upper`           | (flag) upper triangular, the default    |
//! | `-pc_block_lower`           | (flag) lower triangular                 |
//! | `-pc_block_two_level`       | (flag) batched block solves             |
//! | `-pc_block_doc_time`        | (flag) log per-block solve times        |
//! | `-pc_block_assembly`        | `simultaneous`, `block_row`             |
//! | `-pc_block_sub_type`        | `lu`, `jacobi`, `ilu0`                  |
//! | `-pc_block_dof_to_block`    | comma separated block types, e.g. `0,0,1` |
//!
//! Arguments that do not start with `-pc_block_` are skipped, so the same
//! argument list can be shared with other option parsers.

use crate::error::KError;
use crate::preconditioner::BlockAssembly;
use std::str::FromStr;

const PREFIX: &str = "-pc_block_";

/// Block strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockPcType {
    #[default]
    Diagonal,
    Triangular,
    Exact,
    Dummy,
}

impl FromStr for BlockPcType {
    type Err = KError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "diagonal" | "diag" => Ok(BlockPcType::Diagonal),
            "triangular" | "tri" => Ok(BlockPcType::Triangular),
            "exact" => Ok(BlockPcType::Exact),
            "dummy" | "none" => Ok(BlockPcType::Dummy),
            other => Err(invalid("-pc_block_type", format!("unknown block preconditioner '{other}'"))),
        }
    }
}

/// Preconditioner used for each block (or the assembled matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubsidiaryKind {
    /// Dense LU, exact up to round-off
    #[default]
    Lu,
    Jacobi,
    Ilu0,
}

impl FromStr for SubsidiaryKind {
    type Err = KError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lu" | "direct" => Ok(SubsidiaryKind::Lu),
            "jacobi" => Ok(SubsidiaryKind::Jacobi),
            "ilu0" | "ilu" => Ok(SubsidiaryKind::Ilu0),
            other => Err(invalid("-pc_block_sub_type", format!("unknown subsidiary preconditioner '{other}'"))),
        }
    }
}

/// Block preconditioner type & parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPcOptions {
    pub pc_type: BlockPcType,
    /// Upper (true) or lower block-triangular; triangular only
    pub upper: bool,
    /// Batch the diagonal block solves; diagonal only
    pub two_level: bool,
    /// Log the time spent in each block solve; diagonal only
    pub doc_time: bool,
    /// How the block-ordered matrix is assembled; exact only
    pub assembly: BlockAssembly,
    pub subsidiary: SubsidiaryKind,
    /// Grouping of DOF types into blocks (one block per DOF type if `None`)
    pub dof_to_block_map: Option<Vec<usize>>,
}

impl Default for BlockPcOptions {
    fn default() -> Self {
        Self {
            pc_type: BlockPcType::default(),
            upper: true,
            two_level: false,
            doc_time: false,
            assembly: BlockAssembly::default(),
            subsidiary: SubsidiaryKind::default(),
            dof_to_block_map: None,
        }
    }
}

impl BlockPcOptions {
    /// Parse PETSc-style arguments on top of the defaults.
    pub fn from_args(args: &[&str]) -> Result<Self, KError> {
        let mut opts = Self::default();
        let mut it = args.iter().copied();
        while let Some(arg) = it.next() {
            if !arg.starts_with(PREFIX) {
                continue;
            }
            let mut value = || it.next().ok_or_else(|| invalid(arg, "missing value".to_string()));
            match arg {
                "-pc_block_type" => opts.pc_type = value()?.parse()?,
                "-pc_block_upper" => opts.upper = true,
                "-pc_block_lower" => opts.upper = false,
                "-pc_block_two_level" => opts.two_level = true,
                "-pc_block_doc_time" => opts.doc_time = true,
                "-pc_block_assembly" => opts.assembly = value()?.parse()?,
                "-pc_block_sub_type" => opts.subsidiary = value()?.parse()?,
                "-pc_block_dof_to_block" => opts.dof_to_block_map = Some(parse_usize_list(arg, value()?)?),
                _ => return Err(invalid(arg, "unrecognized option".to_string())),
            }
        }
        log::trace!("parsed block preconditioner options: {:?}", opts);
        Ok(opts)
    }
}

fn parse_usize_list(option: &str, s: &str) -> Result<Vec<usize>, KError> {
    s.split(',')
        .map(|t| {
            t.trim()
                .parse::<usize>()
                .map_err(|e| invalid(option, format!("'{t}': {e}")))
        })
        .collect()
}

fn invalid(option: &str, reason: String) -> KError {
    KError::InvalidOption { option: option.to_string(), reason }
}
