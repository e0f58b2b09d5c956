// Graph model trait

use crate::error::Result;
use candle_core::Tensor;

/// Node embedding model over a fixed graph
///
/// `forward` produces one row per node (rows indexed by `global_graph_id`).
/// The variables behind the output live in the shared parameter store under
/// the model's name prefix, so backpropagating a loss computed from the
/// output reaches them.
pub trait GraphModel: Send {
    /// Registry name of the architecture
    fn name(&self) -> &'static str;

    /// Number of node rows produced by `forward`
    fn num_nodes(&self) -> usize;

    /// Width of each node row
    fn out_dim(&self) -> usize;

    /// Compute the node embedding matrix from the current parameters
    fn forward(&self) -> Result<Tensor>;
}
