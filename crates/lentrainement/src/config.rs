// Training hyperparameters

use crate::error::{Result, TrainingError};
use crate::task::TaskKind;
use leplongement::{OptimizerKind, ScoringMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Loop settings shared by both tasks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// What the model is trained to do
    pub task: TaskKind,

    /// Number of epochs
    pub epochs: usize,

    /// Positive pairs per link-prediction batch
    pub batch_size: usize,

    /// Negative pairs per positive pair
    pub negative_factor: usize,

    /// Training nodes scored in the final link-prediction evaluation
    pub eval_subsample: usize,

    /// Update rule
    pub optimizer: OptimizerKind,

    /// Learning rate for the graph model and scoring head
    pub model_lr: f32,

    /// Learning rate for the element table
    pub element_lr: f32,

    /// How link logits are computed
    pub scoring: ScoringMode,

    /// Seed for splits, initialization and sampling
    pub seed: u64,

    /// Fraction of nodes used for training
    pub train_fraction: f64,

    /// Fraction of nodes used for testing; the rest validates
    pub test_fraction: f64,

    /// Where to write a checkpoint after every epoch
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            task: TaskKind::LinkPrediction,
            epochs: 100,
            batch_size: 4096,
            negative_factor: 3,
            eval_subsample: 1000,
            optimizer: OptimizerKind::Adagrad,
            model_lr: 1e-2,
            element_lr: 1e-1,
            scoring: ScoringMode::DotProduct,
            seed: 42,
            train_fraction: 0.6,
            test_fraction: 0.2,
            checkpoint_path: None,
        }
    }
}

impl TrainingConfig {
    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig("batch_size must be positive".into()));
        }
        for (name, lr) in [("model_lr", self.model_lr), ("element_lr", self.element_lr)] {
            if !lr.is_finite() || lr <= 0.0 {
                return Err(TrainingError::InvalidConfig(format!(
                    "{name} must be a positive number, got {lr}"
                )));
            }
        }
        Ok(())
    }
}
