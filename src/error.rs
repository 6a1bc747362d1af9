use thiserror::Error;

// Unified error type for kryst-block

#[derive(Error, Debug)]
pub enum KError {
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("solve error: {0}")]
    SolveError(String),
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("{location}: matrix is not a CsrMatrix and cannot be split into blocks")]
    MatrixType { location: &'static str },
    #[error("{location}: block lookup scheme has not been set up (call setup first)")]
    BlockSetupRequired { location: &'static str },
    #[error("{location}: dimension mismatch (expected {expected}, got {found})")]
    DimensionMismatch {
        location: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{location}: invalid DOF to block map: {reason}")]
    InvalidDofToBlockMap {
        location: &'static str,
        reason: String,
    },
    #[error("{location}: global equation {eqn} is not classified by any mesh")]
    UnclassifiedDof { location: &'static str, eqn: usize },
    #[error("{location}: global equation {eqn} is classified more than once")]
    DuplicateDof { location: &'static str, eqn: usize },
    #[error("{location}: mesh {mesh} is invalid: {reason}")]
    InvalidMesh {
        location: &'static str,
        mesh: usize,
        reason: String,
    },
    #[error("{location}: no meshes have been added")]
    NoMeshes { location: &'static str },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption { option: String, reason: String },
    #[error("{location}: subsidiary setup failed on {nfailed} other process(es)")]
    RemoteSetupFailed { location: &'static str, nfailed: usize },
    #[error("subsidiary preconditioner for block {block} failed: {source}")]
    Subsidiary {
        block: usize,
        #[source]
        source: Box<KError>,
    },
}

impl KError {
    /// Wrap an error raised by the subsidiary preconditioner of `block`.
    pub fn subsidiary(block: usize, source: KError) -> Self {
        KError::Subsidiary {
            block,
            source: Box::new(source),
        }
    }
}
