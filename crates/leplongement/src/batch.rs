// Link-prediction batches
//
// A batch pairs node embeddings with element embeddings: every requested
// node is paired with one observed element (label 1) and with K sampled
// negative elements (label 0). Positives always precede negatives.

use crate::element::ElementEmbedder;
use crate::error::{EmbeddingError, Result};
use crate::gather::gather_rows;
use crate::param::ParamStore;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Name prefix of the classifier head parameters
pub const LINK_PREDICTOR_PARAM: &str = "link_predictor";

/// One assembled link-prediction batch
#[derive(Debug, Clone)]
pub struct LinkBatch {
    /// Node row behind every pair
    pub node_indices: Vec<usize>,
    /// Element compact id behind every pair
    pub element_ids: Vec<usize>,
    /// Node embedding rows, aligned with `node_indices`
    pub nodes: Tensor,
    /// Element embedding rows, aligned with `element_ids`
    pub elements: Tensor,
    /// 1.0 for observed pairs, 0.0 for sampled pairs
    pub labels: Vec<f32>,
    /// Number of leading positive pairs
    pub positives: usize,
}

impl LinkBatch {
    /// Total number of pairs
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the batch holds no pairs
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of trailing negative pairs
    pub fn negatives(&self) -> usize {
        self.labels.len() - self.positives
    }

    /// Labels as a tensor next to the embeddings
    pub fn targets(&self) -> Result<Tensor> {
        Ok(Tensor::from_vec(
            self.labels.clone(),
            self.labels.len(),
            self.nodes.device(),
        )?)
    }
}

/// Assemble positives and `negative_factor` negatives per node
///
/// The batch size is `indices.len()`. Negative node rows repeat the whole
/// positive block `negative_factor` times, so negative pair `j` belongs to
/// node `indices[j % indices.len()]`. Both row sets stay on the autograd
/// graph of `node_embeddings` and of the element table.
pub fn build_link_batch<D, R>(
    node_embeddings: &Tensor,
    store: &ElementEmbedder<D>,
    indices: &[usize],
    negative_factor: usize,
    rng: &mut R,
) -> Result<LinkBatch>
where
    D: Ord + Hash + Clone,
    R: Rng + ?Sized,
{
    let batch_size = indices.len();
    let total = batch_size * (negative_factor + 1);

    let positive = store.lookup(indices, rng)?;
    let negative_ids = store.sample_negative(batch_size * negative_factor, rng);

    let mut node_indices = Vec::with_capacity(total);
    for _ in 0..=negative_factor {
        node_indices.extend_from_slice(indices);
    }
    let nodes = gather_rows(node_embeddings, &node_indices)?;

    let elements = if negative_ids.is_empty() {
        positive.embeddings
    } else {
        let negative = store.embed(&negative_ids)?;
        Tensor::cat(&[&positive.embeddings, &negative], 0)?
    };

    let mut element_ids = positive.ids;
    element_ids.extend_from_slice(&negative_ids);

    let mut labels = vec![1.0; batch_size];
    labels.resize(total, 0.0);

    Ok(LinkBatch {
        node_indices,
        element_ids,
        nodes,
        elements,
        labels,
        positives: batch_size,
    })
}

/// How a (node, element) pair is turned into a logit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Row-wise dot product; no parameters
    #[default]
    DotProduct,
    /// Concatenate both rows and apply a linear binary head
    Classifier,
}

impl ScoringMode {
    /// Parse from a config or CLI string
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "dot" | "dot_product" => Some(Self::DotProduct),
            "classifier" | "concat" => Some(Self::Classifier),
            _ => None,
        }
    }
}

/// Binary head over concatenated node and element embeddings
#[derive(Debug, Clone)]
pub struct LinkPredictor {
    linear: Linear,
}

impl LinkPredictor {
    /// Head for `node_dim + element_dim` inputs, registered in `params`
    pub fn new<R: Rng + ?Sized>(
        node_dim: usize,
        element_dim: usize,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            linear: params.linear(LINK_PREDICTOR_PARAM, node_dim + element_dim, 1, rng)?,
        })
    }

    /// One logit per row pair
    pub fn forward(&self, nodes: &Tensor, elements: &Tensor) -> Result<Tensor> {
        let input = Tensor::cat(&[nodes, elements], 1)?;
        Ok(self.linear.forward(&input)?.squeeze(1)?)
    }
}

/// Logit producer for link batches
#[derive(Debug, Clone)]
pub enum LinkScorer {
    /// `logit = node · element`
    DotProduct,
    /// `logit = head([node; element])`
    Classifier(LinkPredictor),
}

impl LinkScorer {
    /// Scorer for the given mode and embedding widths
    pub fn new<R: Rng + ?Sized>(
        mode: ScoringMode,
        node_dim: usize,
        element_dim: usize,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        match mode {
            ScoringMode::DotProduct => {
                if node_dim != element_dim {
                    return Err(EmbeddingError::ShapeMismatch {
                        op: "dot_product_scorer",
                        left: vec![node_dim],
                        right: vec![element_dim],
                    });
                }
                Ok(Self::DotProduct)
            }
            ScoringMode::Classifier => Ok(Self::Classifier(LinkPredictor::new(
                node_dim,
                element_dim,
                params,
                rng,
            )?)),
        }
    }

    /// Mode of this scorer
    pub fn mode(&self) -> ScoringMode {
        match self {
            Self::DotProduct => ScoringMode::DotProduct,
            Self::Classifier(_) => ScoringMode::Classifier,
        }
    }

    /// One logit per pair, shape `(batch.len(),)`
    pub fn score(&self, batch: &LinkBatch) -> Result<Tensor> {
        match self {
            Self::DotProduct => Ok(batch.nodes.mul(&batch.elements)?.sum(1)?),
            Self::Classifier(head) => head.forward(&batch.nodes, &batch.elements),
        }
    }
}
