// Error types for the embedding core

use thiserror::Error;

/// Result type for embedding operations
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Embedding core errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Two operands have incompatible shapes
    #[error("Shape mismatch in {op}: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// Operation that failed
        op: &'static str,
        /// Dimensions of the left operand
        left: Vec<usize>,
        /// Dimensions of the right operand
        right: Vec<usize>,
    },

    /// A row or id is outside the table
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of available rows
        len: usize,
    },

    /// A source id has no recorded destinations
    #[error("Source id {0} has no destination elements")]
    UnknownSource(usize),

    /// No relation records were provided
    #[error("Element table requires at least one relation record")]
    EmptyElements,

    /// Sampling distribution cannot be built
    #[error("Invalid sampling distribution: {0}")]
    InvalidDistribution(String),

    /// A state dictionary lacks a parameter
    #[error("Missing parameter in state: {0}")]
    MissingParameter(String),

    /// A class label does not fit the logits
    #[error("Label {label} out of range for {classes} classes")]
    InvalidLabel {
        /// Offending label
        label: usize,
        /// Number of classes in the logits
        classes: usize,
    },

    /// Two parallel sequences differ in length
    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// The parameter map lock was poisoned by a panicking thread
    #[error("Parameter store lock poisoned")]
    Poisoned,

    /// Tensor runtime failure
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}
