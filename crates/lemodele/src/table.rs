// Shallow node embedding table
//
// One free row per node. Ignores graph structure; useful as a baseline and
// for quick link-prediction runs.

use crate::error::Result;
use crate::model::GraphModel;
use candle_core::Tensor;
use leplongement::ParamStore;
use rand::Rng;

/// Registry name
pub const TABLE_NAME: &str = "table";

/// Per-node embedding table
#[derive(Debug, Clone)]
pub struct NodeTable {
    embedding: Tensor,
    num_nodes: usize,
    dim: usize,
}

impl NodeTable {
    /// Uniform init in `[-1/sqrt(dim), 1/sqrt(dim))`, registered as `table.embedding`
    pub fn new<R: Rng + ?Sized>(
        num_nodes: usize,
        dim: usize,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        let bound = 1.0 / (dim.max(1) as f32).sqrt();
        Ok(Self {
            embedding: params.uniform("table.embedding", (num_nodes, dim), bound, rng)?,
            num_nodes,
            dim,
        })
    }
}

impl GraphModel for NodeTable {
    fn name(&self) -> &'static str {
        TABLE_NAME
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn out_dim(&self) -> usize {
        self.dim
    }

    fn forward(&self) -> Result<Tensor> {
        Ok(self.embedding.clone())
    }
}
