//! lentrainement - Training and Evaluation
//!
//! *L'Entraînement* (The Training) - one epoch loop for node classification
//! and element link prediction, best-by-validation tracking, and the
//! embedding probe

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Training hyperparameters.
pub mod config;
/// Training error types.
pub mod error;
/// Scores, epoch reports and best tracking.
pub mod metrics;
/// Classifier probe over exported embeddings.
pub mod probe;
/// Task strategies.
pub mod task;
/// The training state machine.
pub mod trainer;

pub use config::TrainingConfig;
pub use error::{Result, TrainingError};
pub use metrics::{BestTracker, EpochReport, Scores};
pub use probe::{run_probe, MlpClassifier, ProbeConfig, ProbeResult};
pub use task::{LinkTask, Task, TaskKind};
pub use trainer::{EpochSampler, Trainer, TrainingOutcome, TrainingState};
