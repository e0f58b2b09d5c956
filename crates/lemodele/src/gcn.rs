// Two-layer graph convolution
//
//   H1 = relu(Â (X W1 + b1))
//   Z  = Â (H1 W2 + b2)
//
// Â is the symmetrically normalized adjacency with self loops and X is a
// trainable input feature matrix (one row per node).

use crate::error::Result;
use crate::model::GraphModel;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
use leplongement::ParamStore;
use rand::Rng;

/// Registry name
pub const GCN_NAME: &str = "gcn";

/// One propagation step: transform every node, then average over neighbors
#[derive(Debug, Clone)]
struct GraphConv {
    linear: Linear,
}

impl GraphConv {
    fn new<R: Rng + ?Sized>(
        name: &str,
        in_dim: usize,
        out_dim: usize,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            linear: params.linear(name, in_dim, out_dim, rng)?,
        })
    }

    fn forward(&self, x: &Tensor, adjacency: &Tensor) -> Result<Tensor> {
        let h = self.linear.forward(x)?;
        Ok(adjacency.matmul(&h)?)
    }
}

/// Graph convolution model
#[derive(Debug, Clone)]
pub struct GraphConvolution {
    adjacency: Tensor,
    features: Tensor,
    conv1: GraphConv,
    conv2: GraphConv,
    num_nodes: usize,
    out_dim: usize,
}

impl GraphConvolution {
    /// Build a model over `adjacency` with randomly initialized features
    ///
    /// Variables are registered in `params` as `gcn.features`, `gcn.conv1.*`
    /// and `gcn.conv2.*`.
    pub fn new<R: Rng + ?Sized>(
        adjacency: Tensor,
        input_dim: usize,
        hidden_dim: usize,
        out_dim: usize,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        let num_nodes = adjacency.dim(0)?;
        let bound = 1.0 / (input_dim.max(1) as f32).sqrt();
        let features = params.uniform("gcn.features", (num_nodes, input_dim), bound, rng)?;
        Ok(Self {
            adjacency,
            features,
            conv1: GraphConv::new("gcn.conv1", input_dim, hidden_dim, params, rng)?,
            conv2: GraphConv::new("gcn.conv2", hidden_dim, out_dim, params, rng)?,
            num_nodes,
            out_dim,
        })
    }
}

impl GraphModel for GraphConvolution {
    fn name(&self) -> &'static str {
        GCN_NAME
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn out_dim(&self) -> usize {
        self.out_dim
    }

    fn forward(&self) -> Result<Tensor> {
        let hidden = self.conv1.forward(&self.features, &self.adjacency)?.relu()?;
        self.conv2.forward(&hidden, &self.adjacency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn path_adjacency(n: usize) -> Tensor {
        let mut dense = vec![0f32; n * n];
        for i in 0..n {
            dense[i * n + i] = 0.5;
            if i + 1 < n {
                dense[i * n + i + 1] = 0.25;
                dense[(i + 1) * n + i] = 0.25;
            }
        }
        Tensor::from_vec(dense, (n, n), &Device::Cpu).unwrap()
    }

    fn sum_of_outputs(model: &GraphConvolution) -> f32 {
        model
            .forward()
            .unwrap()
            .sum_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap()
    }

    #[test]
    fn test_forward_shape() {
        let params = ParamStore::default();
        let mut rng = StdRng::seed_from_u64(0);
        let model = GraphConvolution::new(path_adjacency(5), 4, 6, 3, &params, &mut rng).unwrap();
        assert_eq!(model.forward().unwrap().dims(), &[5, 3]);
        assert_eq!(
            params.num_parameters(|n| n.starts_with("gcn.")).unwrap(),
            5 * 4 + 4 * 6 + 6 + 6 * 3 + 3
        );
    }

    #[test]
    fn test_feature_gradient_matches_finite_difference() {
        let params = ParamStore::default();
        let mut rng = StdRng::seed_from_u64(5);
        let model = GraphConvolution::new(path_adjacency(4), 3, 5, 2, &params, &mut rng).unwrap();

        let features = params.get("gcn.features").unwrap();
        let grads = model.forward().unwrap().sum_all().unwrap().backward().unwrap();
        let analytic = grads.get(&features).unwrap().to_vec2::<f32>().unwrap()[1][2];

        let var = params.vars_matching(|n| n == "gcn.features").unwrap().remove(0);
        let base = features.to_vec2::<f32>().unwrap();
        let eps = 1e-2;
        let shifted = |delta: f32| {
            let mut values = base.clone();
            values[1][2] += delta;
            let flat: Vec<f32> = values.into_iter().flatten().collect();
            var.set(&Tensor::from_vec(flat, (4, 3), &Device::Cpu).unwrap())
                .unwrap();
            sum_of_outputs(&model)
        };
        let numeric = (shifted(eps) - shifted(-eps)) / (2.0 * eps);

        assert!(
            (analytic - numeric).abs() < 1e-2,
            "analytic {analytic} vs numeric {numeric}"
        );
    }
}
