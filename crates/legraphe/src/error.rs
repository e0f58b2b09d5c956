// Graph loading errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Graph and dataset errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// File could not be opened or read
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV/TSV record
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from a header
    #[error("Missing column {column:?} in {path:?}")]
    MissingColumn {
        /// Column name
        column: String,
        /// File involved
        path: PathBuf,
    },

    /// Two node records share an id
    #[error("Duplicate node id {0}")]
    DuplicateNode(i64),

    /// An edge references a node that was never added
    #[error("Unknown node id {0}")]
    UnknownNode(i64),

    /// A numeric text file has a bad entry
    #[error("Parse error in {path:?} line {line}: {message}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// One-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Split fractions do not describe a partition
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// Tensor runtime failure
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl GraphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }
}
