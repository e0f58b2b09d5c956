//! leplongement - Embedding Core
//!
//! *Le Plongement* (The Embedding) - Element embedding tables, weighted negative
//! sampling, and link-prediction batch construction on candle tensors

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Link-prediction batch construction and scoring.
pub mod batch;
/// Category value to dense id compaction.
pub mod compact;
/// Per-destination embedding tables keyed by source id.
pub mod element;
/// Error types for the embedding core.
pub mod error;
/// Row selection on tensors.
pub mod gather;
/// Losses and accuracy metrics.
pub mod loss;
/// Gradient-based optimizers.
pub mod optim;
/// Trainable variables and state dictionaries.
pub mod param;
/// Smoothed negative sampling tables.
pub mod sampling;

pub use batch::{
    build_link_batch, LinkBatch, LinkPredictor, LinkScorer, ScoringMode, LINK_PREDICTOR_PARAM,
};
pub use compact::{compact_property, CompactIndex};
pub use element::{ElementConfig, ElementEmbedder, ElementRows, ELEMENT_TABLE_PARAM};
pub use error::{EmbeddingError, Result};
pub use gather::{gather_rows, index_tensor};
pub use loss::{argmax_accuracy, bce_with_logits, binary_accuracy, cross_entropy};
pub use optim::{Adagrad, GroupOptimizer, OptimizerKind, ParamsAdagrad};
pub use param::{ParamStore, StateDict, TensorData};
pub use sampling::{SamplingTable, DEFAULT_SAMPLING_EXPONENT};
