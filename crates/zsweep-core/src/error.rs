//! Error types for zsweep-rs.

use thiserror::Error;

/// The main error type for zsweep-rs operations.
#[derive(Error, Debug)]
pub enum ZsweepError {
    /// The mesh carries no scalar field to render.
    #[error("no scalar field to render - add point or cell scalars to the mesh")]
    MissingScalars,

    /// A scalar field with the given name was not found on the mesh.
    #[error("scalar field '{0}' not found")]
    ScalarArrayNotFound(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A cell references a vertex that does not exist.
    #[error("cell {cell} references vertex {index}, which is out of range")]
    InvalidVertexIndex { cell: usize, index: u32 },

    /// A configuration value was rejected.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The pre-integration table could not be allocated, even at minimal resolution.
    #[error("could not allocate a pre-integration table of {requested} entries")]
    TableAllocation { requested: usize },

    /// Image encoding error.
    #[error("image error: {0}")]
    Image(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for zsweep-rs operations.
pub type Result<T> = std::result::Result<T, ZsweepError>;
