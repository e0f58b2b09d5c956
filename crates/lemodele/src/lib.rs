//! lemodele - Graph Embedding Models
//!
//! *Le Modèle* (The Model) - node embedding architectures behind one trait,
//! name-based model selection, and verified checkpoints

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Checkpoint persistence.
pub mod checkpoint;
/// Model error types.
pub mod error;
/// Two-layer normalized graph convolution.
pub mod gcn;
/// The graph model trait.
pub mod model;
/// Architecture selection by name.
pub mod registry;
/// Shallow per-node embedding table.
pub mod table;

pub use checkpoint::{BestTracker, Checkpoint};
pub use error::{ModelError, Result};
pub use gcn::GraphConvolution;
pub use model::GraphModel;
pub use registry::{build_model, ModelConfig, ModelGrid, ModelKind};
pub use table::NodeTable;
