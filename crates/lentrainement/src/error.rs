// Training errors

use legraphe::GraphError;
use lemodele::ModelError;
use leplongement::EmbeddingError;
use thiserror::Error;

/// Result type for training operations
pub type Result<T> = std::result::Result<T, TrainingError>;

/// Training errors
#[derive(Debug, Error)]
pub enum TrainingError {
    /// A split the loop needs has no indices
    #[error("The {0} split is empty")]
    EmptySplit(&'static str),

    /// Hyperparameters cannot be used
    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    /// Numeric failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Tensor runtime failure
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Graph data failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Model or checkpoint failure
    #[error(transparent)]
    Model(#[from] ModelError),
}
