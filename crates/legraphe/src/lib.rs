//! legraphe - Source Graph Data
//!
//! *Le Graphe* (The Graph) - source-code graph loading, label and element
//! extraction, normalized adjacency and node splits

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Embedding matrices as whitespace-separated text.
pub mod embedding;
/// Graph and dataset errors.
pub mod error;
/// Petgraph-backed source-code graph.
pub mod graph;
/// Node and edge CSV loaders.
pub mod loader;
/// Train/test/validation splits.
pub mod split;
/// Vocabulary and allowed-name files.
pub mod vocab;

pub use embedding::{parse_matrix_text, read_matrix_text, write_matrix_text};
pub use error::{GraphError, Result};
pub use graph::{EdgeRecord, NodeRecord, SourceGraph};
pub use loader::{load_graph, read_graph, LoadStats};
pub use split::Splits;
pub use vocab::{
    allowed_name_ids, read_allowed_names, read_vocabulary, write_vocabulary, WORD_COLUMN,
};
