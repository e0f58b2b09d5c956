// Scores, epoch reports and best-by-validation tracking

pub use lemodele::BestTracker;
use serde::{Deserialize, Serialize};

/// Metrics of one completed epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// Zero-based epoch
    pub epoch: usize,
    /// Training loss (last batch for link prediction)
    pub loss: f32,
    /// Training accuracy (last batch for link prediction)
    pub train_acc: f32,
    /// Validation accuracy
    pub val_acc: f32,
    /// Test accuracy
    pub test_acc: f32,
}

impl EpochReport {
    /// Feed this epoch into `best`; true when it became the new best
    pub fn record(&self, best: &mut BestTracker) -> bool {
        best.update(self.epoch, self.val_acc, self.test_acc)
    }
}

/// Final evaluation results
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    /// Loss on the training evaluation set
    pub loss: f32,
    /// Training accuracy
    pub train_acc: f32,
    /// Validation accuracy
    pub val_acc: f32,
    /// Test accuracy
    pub test_acc: f32,
    /// Best per-epoch validation accuracy
    pub best_val_acc: f32,
    /// Test accuracy at the best validation epoch
    pub best_test_acc: f32,
    /// Epoch of the best validation accuracy
    pub best_epoch: Option<usize>,
    /// Epochs that ran to completion
    pub epochs_completed: usize,
    /// Whether training stopped on an interrupt
    pub interrupted: bool,
}
