// Checkpoint persistence
//
// File layout: bincode-encoded `Envelope { digest, payload }` where `payload`
// is the bincode-encoded `Checkpoint` and `digest` its blake3 hex hash.

use crate::error::{ModelError, Result};
use crate::model::GraphModel;
use leplongement::{ParamStore, StateDict};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Tracks the best validation accuracy and the test accuracy at that epoch
///
/// Starts at zero and only moves on a strict improvement, so ties keep the
/// earlier epoch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BestTracker {
    /// Best validation accuracy so far
    pub best_val_acc: f32,
    /// Test accuracy at the best validation epoch
    pub best_test_acc: f32,
    /// Epoch of the best validation accuracy
    pub best_epoch: Option<usize>,
}

impl BestTracker {
    /// Record an epoch; returns true when it became the new best
    pub fn update(&mut self, epoch: usize, val_acc: f32, test_acc: f32) -> bool {
        if self.best_val_acc < val_acc {
            self.best_val_acc = val_acc;
            self.best_test_acc = test_acc;
            self.best_epoch = Some(epoch);
            true
        } else {
            false
        }
    }
}

/// Saved training state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Architecture that produced the model variables
    pub model_name: String,
    /// Last completed epoch, `None` if none completed yet
    pub epoch: Option<usize>,
    /// Every trainable variable: graph model, element table, scoring head
    pub state: StateDict,
    /// Best-by-validation record at save time
    pub best: BestTracker,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    digest: String,
    payload: Vec<u8>,
}

impl Checkpoint {
    /// Snapshot every variable in `params` along with the loop position
    pub fn capture(
        model: &dyn GraphModel,
        params: &ParamStore,
        epoch: Option<usize>,
        best: BestTracker,
    ) -> Result<Self> {
        Ok(Self {
            model_name: model.name().to_string(),
            epoch,
            state: params.state_dict()?,
            best,
        })
    }

    /// First epoch a resumed run should train
    pub fn next_epoch(&self) -> usize {
        self.epoch.map_or(0, |epoch| epoch + 1)
    }

    /// Write the checkpoint, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = bincode::serialize(self)?;
        let envelope = Envelope {
            digest: blake3::hash(&payload).to_hex().to_string(),
            payload,
        };
        let bytes = bincode::serialize(&envelope)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ModelError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|source| ModelError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), epoch = ?self.epoch, "Saved checkpoint");
        Ok(())
    }

    /// Read and verify a checkpoint
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let envelope: Envelope = bincode::deserialize(&bytes)?;
        let found = blake3::hash(&envelope.payload).to_hex().to_string();
        if found != envelope.digest {
            return Err(ModelError::CorruptCheckpoint {
                path: path.to_path_buf(),
                expected: envelope.digest,
                found,
            });
        }
        Ok(bincode::deserialize(&envelope.payload)?)
    }

    /// Overwrite the variables in `params`, after checking the architecture
    pub fn restore(&self, model: &dyn GraphModel, params: &ParamStore) -> Result<()> {
        if model.name() != self.model_name {
            return Err(ModelError::ModelMismatch {
                expected: model.name().to_string(),
                found: self.model_name.clone(),
            });
        }
        params.load_state_dict(&self.state)?;
        Ok(())
    }
}
