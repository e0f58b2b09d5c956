// Task strategies
//
// The loop is the same for both tasks; what differs is how a training step
// turns node embeddings into a loss and how a split is scored.

use crate::error::{Result, TrainingError};
use candle_core::Tensor;
use legraphe::SourceGraph;
use leplongement::{
    argmax_accuracy, bce_with_logits, binary_accuracy, build_link_batch, cross_entropy,
    ElementConfig, ElementEmbedder, LinkScorer, ParamStore, ScoringMode,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Task selector for configuration files and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Predict each node's type from its embedding
    Classification,
    /// Score (node, name element) pairs against sampled negatives
    #[default]
    LinkPrediction,
}

impl TaskKind {
    /// Parse from a CLI string
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "classification" | "node_classification" => Some(Self::Classification),
            "link_prediction" | "link" => Some(Self::LinkPrediction),
            _ => None,
        }
    }
}

/// Element link-prediction state
#[derive(Debug, Clone)]
pub struct LinkTask {
    /// Name elements per node
    pub store: ElementEmbedder<String>,
    /// Pair scorer
    pub scorer: LinkScorer,
    /// Negatives per positive during training
    pub negative_factor: usize,
}

/// Loss and accuracy of one training step
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Mean loss, still on the autograd graph
    pub loss: Tensor,
    /// Accuracy on the scored examples
    pub accuracy: f32,
}

/// Training task
#[derive(Debug, Clone)]
pub enum Task {
    /// Softmax over node types
    Classification {
        /// Class per node
        labels: Vec<usize>,
        /// Number of distinct classes
        num_classes: usize,
    },
    /// Node to name-element link prediction
    LinkPrediction(LinkTask),
}

impl Task {
    /// Node-type classification over `graph`
    pub fn classification(graph: &SourceGraph) -> Self {
        Task::Classification {
            labels: graph.labels(),
            num_classes: graph.num_classes(),
        }
    }

    /// Link prediction between nodes and the last segment of their names
    pub fn link_prediction<R: Rng + ?Sized>(
        graph: &SourceGraph,
        elements: &ElementConfig,
        scoring: ScoringMode,
        node_dim: usize,
        negative_factor: usize,
        params: &ParamStore,
        rng: &mut R,
    ) -> Result<Self> {
        let store = ElementEmbedder::new(&graph.element_records(), elements, params, rng)?;
        let scorer = LinkScorer::new(scoring, node_dim, store.emb_size(), params, rng)?;
        Ok(Task::LinkPrediction(LinkTask {
            store,
            scorer,
            negative_factor,
        }))
    }

    /// Width the graph model must produce for this task
    pub fn node_dim(kind: TaskKind, graph: &SourceGraph, elements: &ElementConfig) -> usize {
        match kind {
            TaskKind::Classification => graph.num_classes(),
            TaskKind::LinkPrediction => elements.emb_size,
        }
    }

    /// Selector of this task
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Classification { .. } => TaskKind::Classification,
            Task::LinkPrediction(_) => TaskKind::LinkPrediction,
        }
    }

    /// Loss and accuracy for one training step
    ///
    /// The loss stays attached to `node_embeddings` and to the element
    /// table, so one `backward` reaches the graph model, the scoring head
    /// and the sampled element rows.
    pub fn train_step<R: Rng + ?Sized>(
        &self,
        node_embeddings: &Tensor,
        indices: &[usize],
        rng: &mut R,
    ) -> Result<StepOutput> {
        match self {
            Task::Classification { labels, .. } => Ok(StepOutput {
                loss: cross_entropy(node_embeddings, labels, indices)?,
                accuracy: argmax_accuracy(node_embeddings, labels, indices)?,
            }),
            Task::LinkPrediction(link) => {
                let batch = build_link_batch(
                    node_embeddings,
                    &link.store,
                    indices,
                    link.negative_factor,
                    rng,
                )?;
                let logits = link.scorer.score(&batch)?;
                let targets = batch.targets()?;
                Ok(StepOutput {
                    loss: bce_with_logits(&logits, &targets)?,
                    accuracy: binary_accuracy(&logits, &targets)?,
                })
            }
        }
    }

    /// Loss and accuracy on `indices`
    ///
    /// Link prediction pairs every node with one observed and one sampled
    /// element.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        node_embeddings: &Tensor,
        indices: &[usize],
        rng: &mut R,
    ) -> Result<(f32, f32)> {
        match self {
            Task::Classification { labels, .. } => {
                let loss = cross_entropy(node_embeddings, labels, indices)?;
                Ok((
                    loss.to_scalar::<f32>()?,
                    argmax_accuracy(node_embeddings, labels, indices)?,
                ))
            }
            Task::LinkPrediction(link) => {
                let batch = build_link_batch(node_embeddings, &link.store, indices, 1, rng)?;
                let logits = link.scorer.score(&batch)?;
                let targets = batch.targets()?;
                let loss = bce_with_logits(&logits, &targets)?.to_scalar::<f32>()?;
                Ok((loss, binary_accuracy(&logits, &targets)?))
            }
        }
    }

    /// Number of link-prediction batches per epoch
    ///
    /// Equals the number of distinct source keys divided by the batch size,
    /// remainder discarded. Classification always takes one full-graph step.
    pub fn batches_per_epoch(&self, batch_size: usize) -> usize {
        match self {
            Task::Classification { .. } => 1,
            Task::LinkPrediction(link) => link.store.len() / batch_size.max(1),
        }
    }

    /// Fails when the task cannot train on `graph`
    pub fn check(&self, num_nodes: usize, node_dim: usize) -> Result<()> {
        match self {
            Task::Classification {
                labels,
                num_classes,
            } => {
                if labels.len() != num_nodes {
                    return Err(TrainingError::InvalidConfig(format!(
                        "{} labels for {} nodes",
                        labels.len(),
                        num_nodes
                    )));
                }
                if *num_classes != node_dim {
                    return Err(TrainingError::InvalidConfig(format!(
                        "model produces {node_dim} logits for {num_classes} classes"
                    )));
                }
                Ok(())
            }
            Task::LinkPrediction(_) => Ok(()),
        }
    }
}
