// Model and checkpoint errors

use legraphe::GraphError;
use leplongement::EmbeddingError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// No architecture is registered under this name
    #[error("Unknown model: {0:?}")]
    UnknownModel(String),

    /// A checkpoint was written by a different architecture
    #[error("Checkpoint was written by model {found:?}, expected {expected:?}")]
    ModelMismatch {
        /// Architecture being restored
        expected: String,
        /// Architecture recorded in the checkpoint
        found: String,
    },

    /// Checkpoint payload does not match its digest
    #[error("Corrupt checkpoint {path:?}: digest {found} != {expected}")]
    CorruptCheckpoint {
        /// File involved
        path: PathBuf,
        /// Digest stored in the file
        expected: String,
        /// Digest of the payload read
        found: String,
    },

    /// Checkpoint file could not be read or written
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint encoding failed
    #[error("Checkpoint encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Numeric failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Tensor runtime failure
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Graph construction failure
    #[error(transparent)]
    Graph(#[from] GraphError),
}
