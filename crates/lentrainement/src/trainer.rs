// Training and evaluation loop
//
// Initializing -> TrainingEpoch(e) -> Evaluating(e) -> ... ->
//   Converged | Interrupted -> FinalEvaluating -> Finished
//
// The cancellation flag is read before every batch and after every epoch.
// An interrupt keeps the current parameters and goes straight to the final
// evaluation. Every step runs one backward pass over the shared parameter
// store; the element table and everything else are two optimizer groups with
// their own learning rates.

use crate::config::TrainingConfig;
use crate::error::{Result, TrainingError};
use crate::metrics::{BestTracker, EpochReport, Scores};
use crate::task::Task;
use legraphe::Splits;
use lemodele::{Checkpoint, GraphModel};
use leplongement::{GroupOptimizer, ParamStore, ELEMENT_TABLE_PARAM};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Where the loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// Validating inputs
    Initializing,
    /// Running the batches of an epoch
    TrainingEpoch(usize),
    /// Scoring validation and test after an epoch
    Evaluating(usize),
    /// All epochs ran
    Converged,
    /// Stopped by the cancellation flag
    Interrupted,
    /// Computing final scores
    FinalEvaluating,
    /// Done
    Finished,
}

/// Draws training batches without replacement, reshuffling when exhausted
#[derive(Debug, Clone)]
pub struct EpochSampler {
    order: Vec<usize>,
    cursor: usize,
}

impl EpochSampler {
    /// Sampler over `indices`
    pub fn new(indices: &[usize]) -> Self {
        Self {
            order: indices.to_vec(),
            cursor: 0,
        }
    }

    /// Shuffle and restart from the beginning
    pub fn start_epoch<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
        self.cursor = 0;
    }

    /// Next `size` indices
    pub fn next_batch<R: Rng + ?Sized>(&mut self, size: usize, rng: &mut R) -> Vec<usize> {
        let mut batch = Vec::with_capacity(size);
        if self.order.is_empty() {
            return batch;
        }
        while batch.len() < size {
            if self.cursor == self.order.len() {
                self.order.shuffle(rng);
                self.cursor = 0;
            }
            let take = (size - batch.len()).min(self.order.len() - self.cursor);
            batch.extend_from_slice(&self.order[self.cursor..self.cursor + take]);
            self.cursor += take;
        }
        batch
    }
}

/// Everything a finished run hands back
pub struct TrainingOutcome {
    /// Final scores
    pub scores: Scores,
    /// One report per epoch completed by this run
    pub history: Vec<EpochReport>,
    /// Last completed epoch, counting epochs restored from a checkpoint
    pub last_epoch: Option<usize>,
    /// Best-by-validation record, counting epochs restored from a checkpoint
    pub best: BestTracker,
    /// Trained model
    pub model: Box<dyn GraphModel>,
    /// Trained task state
    pub task: Task,
    /// Every trained variable
    pub params: ParamStore,
}

impl TrainingOutcome {
    /// Snapshot of the run for resuming later
    pub fn checkpoint(&self) -> Result<Checkpoint> {
        Ok(Checkpoint::capture(
            self.model.as_ref(),
            &self.params,
            self.last_epoch,
            self.best,
        )?)
    }
}

enum EpochResult {
    Completed { loss: f32, train_acc: f32 },
    Interrupted,
}

/// Training loop over one model and one task
pub struct Trainer {
    config: TrainingConfig,
    model: Box<dyn GraphModel>,
    task: Task,
    params: ParamStore,
    splits: Splits,
    optimizers: Vec<GroupOptimizer>,
    sampler: EpochSampler,
    rng: StdRng,
    state: TrainingState,
    best: BestTracker,
    history: Vec<EpochReport>,
    start_epoch: usize,
    last_completed: Option<usize>,
    last_train: (f32, f32),
}

impl Trainer {
    /// Assemble a trainer
    ///
    /// `params` must hold the variables of both `model` and `task`. The loop
    /// rng is seeded from `config.seed`, so two trainers built from the same
    /// inputs run identically.
    pub fn new(
        config: TrainingConfig,
        model: Box<dyn GraphModel>,
        task: Task,
        params: ParamStore,
        splits: Splits,
    ) -> Self {
        Self {
            sampler: EpochSampler::new(&splits.train),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            model,
            task,
            params,
            splits,
            optimizers: Vec::new(),
            state: TrainingState::Initializing,
            best: BestTracker::default(),
            history: Vec::new(),
            start_epoch: 0,
            last_completed: None,
            last_train: (0.0, 0.0),
        }
    }

    /// Continue from a checkpoint
    ///
    /// Restores every variable and the best-by-validation record, then
    /// skips the epochs the checkpoint covers. Epoch history and optimizer
    /// accumulators are not part of a checkpoint and start empty.
    pub fn resume_from(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        checkpoint.restore(self.model.as_ref(), &self.params)?;
        self.start_epoch = checkpoint.next_epoch();
        self.last_completed = checkpoint.epoch;
        self.best = checkpoint.best;
        info!(
            epoch = ?checkpoint.epoch,
            best_val_acc = self.best.best_val_acc,
            "Resumed from checkpoint"
        );
        Ok(())
    }

    /// Current state
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Run to completion or interruption, then evaluate
    pub fn run(mut self, cancel: &AtomicBool) -> Result<TrainingOutcome> {
        let mut interrupted = false;
        let mut scores = Scores::default();

        loop {
            let next = match self.state {
                TrainingState::Initializing => {
                    self.initialize()?;
                    if self.start_epoch >= self.config.epochs {
                        TrainingState::Converged
                    } else {
                        TrainingState::TrainingEpoch(self.start_epoch)
                    }
                }
                TrainingState::TrainingEpoch(epoch) => match self.train_epoch(epoch, cancel)? {
                    EpochResult::Completed { loss, train_acc } => {
                        self.last_train = (loss, train_acc);
                        TrainingState::Evaluating(epoch)
                    }
                    EpochResult::Interrupted => TrainingState::Interrupted,
                },
                TrainingState::Evaluating(epoch) => {
                    self.evaluate_epoch(epoch)?;
                    if cancel.load(Ordering::SeqCst) {
                        TrainingState::Interrupted
                    } else if epoch + 1 >= self.config.epochs {
                        TrainingState::Converged
                    } else {
                        TrainingState::TrainingEpoch(epoch + 1)
                    }
                }
                TrainingState::Converged => TrainingState::FinalEvaluating,
                TrainingState::Interrupted => {
                    warn!("Training interrupted");
                    interrupted = true;
                    TrainingState::FinalEvaluating
                }
                TrainingState::FinalEvaluating => {
                    scores = self.final_evaluation()?;
                    scores.interrupted = interrupted;
                    TrainingState::Finished
                }
                TrainingState::Finished => break,
            };
            debug!(from = ?self.state, to = ?next, "State transition");
            self.state = next;
        }

        Ok(TrainingOutcome {
            scores,
            history: self.history,
            last_epoch: self.last_completed,
            best: self.best,
            model: self.model,
            task: self.task,
            params: self.params,
        })
    }

    fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        if self.splits.train.is_empty() {
            return Err(TrainingError::EmptySplit("train"));
        }
        if self.splits.len() != self.model.num_nodes() {
            return Err(TrainingError::InvalidConfig(format!(
                "splits cover {} nodes, model has {}",
                self.splits.len(),
                self.model.num_nodes()
            )));
        }
        self.task.check(self.model.num_nodes(), self.model.out_dim())?;
        self.build_optimizers()?;
        info!(
            task = ?self.task.kind(),
            model = self.model.name(),
            epochs = self.config.epochs,
            train = self.splits.train.len(),
            test = self.splits.test.len(),
            val = self.splits.val.len(),
            "Starting training"
        );
        Ok(())
    }

    fn build_optimizers(&mut self) -> Result<()> {
        let kind = self.config.optimizer;
        let element_vars = self.params.vars_matching(|name| name == ELEMENT_TABLE_PARAM)?;
        let model_vars = self.params.vars_matching(|name| name != ELEMENT_TABLE_PARAM)?;

        self.optimizers.clear();
        if !model_vars.is_empty() {
            self.optimizers.push(GroupOptimizer::new(
                kind,
                model_vars,
                f64::from(self.config.model_lr),
            )?);
        }
        if !element_vars.is_empty() {
            self.optimizers.push(GroupOptimizer::new(
                kind,
                element_vars,
                f64::from(self.config.element_lr),
            )?);
        }
        debug!(groups = self.optimizers.len(), optimizer = ?kind, "Built optimizers");
        Ok(())
    }

    fn train_epoch(&mut self, epoch: usize, cancel: &AtomicBool) -> Result<EpochResult> {
        self.sampler.start_epoch(&mut self.rng);

        let num_batches = self.task.batches_per_epoch(self.config.batch_size);
        let (mut loss, mut train_acc) = self.last_train;
        for batch_ind in 0..num_batches {
            if cancel.load(Ordering::SeqCst) {
                return Ok(EpochResult::Interrupted);
            }

            let indices = match self.task {
                Task::Classification { .. } => self.splits.train.clone(),
                Task::LinkPrediction(_) => self
                    .sampler
                    .next_batch(self.config.batch_size, &mut self.rng),
            };

            let node_embeddings = self.model.forward()?;
            let step = self
                .task
                .train_step(&node_embeddings, &indices, &mut self.rng)?;
            let grads = step.loss.backward()?;
            for optimizer in self.optimizers.iter_mut() {
                optimizer.step(&grads)?;
            }

            loss = step.loss.to_scalar::<f32>()?;
            train_acc = step.accuracy;
            debug!(
                epoch,
                batch = batch_ind + 1,
                batches = num_batches,
                loss,
                acc = train_acc,
                "Batch complete"
            );
        }

        Ok(EpochResult::Completed { loss, train_acc })
    }

    fn evaluate_epoch(&mut self, epoch: usize) -> Result<()> {
        let node_embeddings = self.model.forward()?;
        let (_, test_acc) = self
            .task
            .evaluate(&node_embeddings, &self.splits.test, &mut self.rng)?;
        let (_, val_acc) = self
            .task
            .evaluate(&node_embeddings, &self.splits.val, &mut self.rng)?;

        let (loss, train_acc) = self.last_train;
        let report = EpochReport {
            epoch,
            loss,
            train_acc,
            val_acc,
            test_acc,
        };
        report.record(&mut self.best);
        self.history.push(report);
        self.last_completed = Some(epoch);

        info!(
            epoch,
            loss,
            train_acc,
            val_acc,
            best_val_acc = self.best.best_val_acc,
            test_acc,
            best_test_acc = self.best.best_test_acc,
            "Epoch complete"
        );

        if let Some(path) = &self.config.checkpoint_path {
            Checkpoint::capture(self.model.as_ref(), &self.params, Some(epoch), self.best)?
                .save(path)?;
        }
        Ok(())
    }

    fn final_evaluation(&mut self) -> Result<Scores> {
        let node_embeddings = self.model.forward()?;

        let train_eval: Vec<usize> = match self.task {
            Task::Classification { .. } => self.splits.train.clone(),
            Task::LinkPrediction(_) => {
                let size = self.config.eval_subsample.min(self.splits.train.len());
                self.splits
                    .train
                    .choose_multiple(&mut self.rng, size)
                    .copied()
                    .collect()
            }
        };

        let (loss, train_acc) = self
            .task
            .evaluate(&node_embeddings, &train_eval, &mut self.rng)?;
        let (_, test_acc) = self
            .task
            .evaluate(&node_embeddings, &self.splits.test, &mut self.rng)?;
        let (_, val_acc) = self
            .task
            .evaluate(&node_embeddings, &self.splits.val, &mut self.rng)?;

        let scores = Scores {
            loss,
            train_acc,
            val_acc,
            test_acc,
            best_val_acc: self.best.best_val_acc,
            best_test_acc: self.best.best_test_acc,
            best_epoch: self.best.best_epoch,
            epochs_completed: self.history.len(),
            interrupted: false,
        };
        info!(
            loss,
            train_acc,
            val_acc,
            test_acc,
            "Final evaluation"
        );
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_sampler_covers_permutation_before_repeating() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut sampler = EpochSampler::new(&[0, 1, 2, 3, 4]);
        sampler.start_epoch(&mut rng);

        let first: BTreeSet<usize> = sampler.next_batch(3, &mut rng).into_iter().collect();
        let second: BTreeSet<usize> = sampler.next_batch(2, &mut rng).into_iter().collect();
        assert_eq!(first.len(), 3);
        assert!(first.is_disjoint(&second));

        // exhausted: the next batch comes from a fresh permutation
        let third = sampler.next_batch(4, &mut rng);
        assert_eq!(third.iter().collect::<BTreeSet<_>>().len(), 4);
    }

    #[test]
    fn test_sampler_wraps_for_large_batches() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut sampler = EpochSampler::new(&[7, 8]);
        sampler.start_epoch(&mut rng);
        let batch = sampler.next_batch(5, &mut rng);
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|i| *i == 7 || *i == 8));
    }

    #[test]
    fn test_empty_sampler_yields_empty_batch() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut sampler = EpochSampler::new(&[]);
        assert!(sampler.next_batch(3, &mut rng).is_empty());
    }
}
