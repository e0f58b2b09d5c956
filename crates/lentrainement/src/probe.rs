// Embedding probe
//
// Checks how much naming information exported embeddings carry: rows for a
// list of known names are classified by function name (last dotted segment)
// and by module name (first dotted segment) with a small MLP, once per
// hidden-layer configuration.

use crate::error::{Result, TrainingError};
use candle_core::{Tensor, D};
use candle_nn::{Linear, Module};
use leplongement::{
    argmax_accuracy, cross_entropy, gather_rows, CompactIndex, GroupOptimizer, OptimizerKind,
    ParamStore,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Hidden layer widths, one classifier per entry
    pub hidden_layers: Vec<Vec<usize>>,
    /// Adam learning rate
    pub learning_rate: f32,
    /// Full-batch training iterations
    pub iterations: usize,
    /// Fraction of rows used for training
    pub train_fraction: f64,
    /// Seed for the split and the weight init
    pub seed: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![vec![200], vec![300], vec![200, 400], vec![300, 500]],
            learning_rate: 0.01,
            iterations: 300,
            train_fraction: 0.7,
            seed: 42,
        }
    }
}

/// Accuracy of one classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Which embedding matrix (`in` or `out`)
    pub representation: String,
    /// Which label (`function` or `module`)
    pub label: String,
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    /// Test accuracy
    pub accuracy: f32,
}

/// Multi-layer perceptron with ReLU hidden layers and a softmax output
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    layers: Vec<Linear>,
    params: ParamStore,
}

impl MlpClassifier {
    /// Network `input -> hidden... -> classes` with its own variables
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        hidden: &[usize],
        classes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let params = ParamStore::default();
        let mut widths = vec![input_dim];
        widths.extend_from_slice(hidden);
        widths.push(classes);
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, w)| params.linear(&format!("mlp.{i}"), w[0], w[1], rng))
            .collect::<leplongement::Result<Vec<_>>>()?;
        Ok(Self { layers, params })
    }

    fn logits(&self, x: &Tensor) -> Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut h = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i != last {
                h = h.relu()?;
            }
        }
        Ok(h)
    }

    /// Full-batch training with Adam; returns the last loss
    pub fn fit(&self, x: &Tensor, labels: &[usize], lr: f32, iterations: usize) -> Result<f32> {
        let rows: Vec<usize> = (0..x.dim(0)?).collect();
        let mut optimizer = GroupOptimizer::new(
            OptimizerKind::Adam,
            self.params.vars_matching(|_| true)?,
            f64::from(lr),
        )?;
        let mut loss = 0.0;
        for _ in 0..iterations {
            let l = cross_entropy(&self.logits(x)?, labels, &rows)?;
            optimizer.step(&l.backward()?)?;
            loss = l.to_scalar::<f32>()?;
        }
        Ok(loss)
    }

    /// Most likely class per row
    pub fn predict(&self, x: &Tensor) -> Result<Vec<usize>> {
        let classes = self.logits(x)?.argmax(D::Minus1)?.to_vec1::<u32>()?;
        Ok(classes.into_iter().map(|c| c as usize).collect())
    }

    /// Fraction of rows classified correctly
    pub fn accuracy(&self, x: &Tensor, labels: &[usize]) -> Result<f32> {
        let rows: Vec<usize> = (0..x.dim(0)?).collect();
        Ok(argmax_accuracy(&self.logits(x)?, labels, &rows)?)
    }
}

fn function_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn module_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Seeded shuffle, train part `floor(train_fraction * n)`, test the rest
fn train_test_split(n: usize, train_fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let train_len = ((train_fraction * n as f64).floor() as usize).min(n);
    let test = order.split_off(train_len);
    (order, test)
}

/// Classify the rows of both matrices by function and by module name
///
/// `named_rows` pairs each qualified name with its row in `input` and
/// `output`. Results come in the order (in, function), (out, function),
/// (in, module), (out, module), each over every hidden configuration.
pub fn run_probe(
    input: &Tensor,
    output: &Tensor,
    named_rows: &[(String, usize)],
    config: &ProbeConfig,
) -> Result<Vec<ProbeResult>> {
    if named_rows.is_empty() {
        return Err(TrainingError::EmptySplit("probe"));
    }
    let rows: Vec<usize> = named_rows.iter().map(|(_, r)| *r).collect();
    let representations = [
        ("in", gather_rows(input, &rows)?),
        ("out", gather_rows(output, &rows)?),
    ];

    let label_sets: [(&str, fn(&str) -> &str); 2] =
        [("function", function_name), ("module", module_name)];

    let mut split_rng = StdRng::seed_from_u64(config.seed);
    let (train, test) = train_test_split(rows.len(), config.train_fraction, &mut split_rng);
    if train.is_empty() {
        return Err(TrainingError::EmptySplit("probe train"));
    }

    let mut results = Vec::new();
    for (label, extract) in label_sets {
        let names: Vec<&str> = named_rows.iter().map(|(n, _)| extract(n)).collect();
        let classes = CompactIndex::from_values(names.iter().copied());
        let labels: Vec<usize> = names
            .iter()
            .filter_map(|n| classes.id(n))
            .collect();
        let train_labels: Vec<usize> = train.iter().map(|&i| labels[i]).collect();
        let test_labels: Vec<usize> = test.iter().map(|&i| labels[i]).collect();

        for (representation, data) in &representations {
            let x_train = gather_rows(data, &train)?;
            let x_test = gather_rows(data, &test)?;
            let input_dim = data.dim(1)?;

            for hidden in &config.hidden_layers {
                let mut rng = StdRng::seed_from_u64(config.seed);
                let mlp = MlpClassifier::new(input_dim, hidden, classes.len(), &mut rng)?;
                mlp.fit(&x_train, &train_labels, config.learning_rate, config.iterations)?;
                let accuracy = mlp.accuracy(&x_test, &test_labels)?;

                info!(
                    representation = *representation,
                    label,
                    hidden = ?hidden,
                    accuracy,
                    "Probe classifier"
                );
                results.push(ProbeResult {
                    representation: representation.to_string(),
                    label: label.to_string(),
                    hidden_layers: hidden.clone(),
                    accuracy,
                });
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rstest::rstest;

    #[test]
    fn test_name_segments() {
        assert_eq!(function_name("pkg.mod.run"), "run");
        assert_eq!(module_name("pkg.mod.run"), "pkg");
        assert_eq!(function_name("solo"), "solo");
    }

    #[rstest]
    #[case(10, 0.7, 7)]
    #[case(7, 0.7, 4)]
    #[case(3, 0.5, 1)]
    #[case(5, 1.0, 5)]
    #[case(4, 0.0, 0)]
    fn test_split_floors_train_part(
        #[case] n: usize,
        #[case] fraction: f64,
        #[case] train_len: usize,
    ) {
        let mut rng = StdRng::seed_from_u64(42);
        let (train, test) = train_test_split(n, fraction, &mut rng);
        assert_eq!(train.len(), train_len);
        assert_eq!(test.len(), n - train_len);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_mlp_learns_separable_classes() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = Tensor::new(
            &[[1f32, 0.0], [0.9, 0.1], [0.0, 1.0], [0.1, 0.9]],
            &Device::Cpu,
        )
        .unwrap();
        let labels = [0, 0, 1, 1];
        let mlp = MlpClassifier::new(2, &[8], 2, &mut rng).unwrap();
        let loss = mlp.fit(&x, &labels, 0.05, 200).unwrap();
        assert!(loss < 0.1, "loss {loss}");
        assert_eq!(mlp.predict(&x).unwrap(), vec![0, 0, 1, 1]);
        assert_eq!(mlp.accuracy(&x, &labels).unwrap(), 1.0);
    }

    #[test]
    fn test_probe_reports_every_combination() {
        let names = ["a.run", "a.stop", "b.run", "b.stop", "a.run2", "b.run2"];
        let named_rows: Vec<(String, usize)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i))
            .collect();
        let input = Tensor::rand(-1f32, 1.0, (6, 3), &Device::Cpu).unwrap();
        let output = Tensor::rand(-1f32, 1.0, (6, 3), &Device::Cpu).unwrap();
        let config = ProbeConfig {
            hidden_layers: vec![vec![4], vec![4, 3]],
            iterations: 5,
            ..ProbeConfig::default()
        };

        let results = run_probe(&input, &output, &named_rows, &config).unwrap();
        assert_eq!(results.len(), 2 * 2 * 2);
        assert_eq!(results[0].label, "function");
        assert_eq!(results[0].representation, "in");
        assert_eq!(results[2].representation, "out");
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.accuracy)));
    }
}
