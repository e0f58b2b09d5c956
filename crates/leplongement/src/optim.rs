// Gradient-based optimizers
//
// SGD and Adam come from candle-nn. Adagrad keeps a running sum of squared
// gradients per variable. Each `GroupOptimizer` owns one group of variables
// with its own learning rate, so the graph model and the element table can
// be stepped from the same gradient store at different speeds.

use crate::error::Result;
use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, SGD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported update rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// Plain stochastic gradient descent
    Sgd,
    /// Adam with bias correction, no weight decay
    #[default]
    Adam,
    /// Adagrad with accumulated squared gradients
    Adagrad,
}

impl OptimizerKind {
    /// Parse from a config or CLI string
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sgd" => Some(Self::Sgd),
            "adam" => Some(Self::Adam),
            "adagrad" => Some(Self::Adagrad),
            _ => None,
        }
    }
}

/// Adagrad settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsAdagrad {
    /// Base learning rate
    pub lr: f64,
    /// Added to the root of the accumulator
    pub eps: f64,
}

impl Default for ParamsAdagrad {
    fn default() -> Self {
        Self { lr: 1e-2, eps: 1e-10 }
    }
}

/// Adagrad: `x -= lr * g / (sqrt(sum g^2) + eps)`
#[derive(Debug)]
pub struct Adagrad {
    vars: Vec<(Var, Tensor)>,
    params: ParamsAdagrad,
}

impl Optimizer for Adagrad {
    type Config = ParamsAdagrad;

    fn new(vars: Vec<Var>, params: ParamsAdagrad) -> candle_core::Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let sum = var.zeros_like()?;
                Ok((var, sum))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { vars, params })
    }

    fn step(&mut self, grads: &GradStore) -> candle_core::Result<()> {
        for (var, sum) in self.vars.iter_mut() {
            let Some(grad) = grads.get(var.as_tensor()) else {
                continue;
            };
            let next = sum.add(&grad.sqr()?)?;
            let scaled = grad.div(&next.sqrt()?.affine(1.0, self.params.eps)?)?;
            var.set(&var.sub(&scaled.affine(self.params.lr, 0.0)?)?)?;
            *sum = next;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr;
    }
}

/// One parameter group and its update rule
pub enum GroupOptimizer {
    /// Stochastic gradient descent
    Sgd(SGD),
    /// Adam (AdamW with zero decay)
    Adam(AdamW),
    /// Adagrad
    Adagrad(Adagrad),
}

impl fmt::Debug for GroupOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupOptimizer")
            .field("kind", &self.kind())
            .field("lr", &self.learning_rate())
            .finish()
    }
}

impl GroupOptimizer {
    /// Optimizer of `kind` over `vars` with learning rate `lr`
    pub fn new(kind: OptimizerKind, vars: Vec<Var>, lr: f64) -> Result<Self> {
        Ok(match kind {
            OptimizerKind::Sgd => Self::Sgd(SGD::new(vars, lr)?),
            OptimizerKind::Adam => Self::Adam(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    weight_decay: 0.0,
                    ..ParamsAdamW::default()
                },
            )?),
            OptimizerKind::Adagrad => Self::Adagrad(Adagrad::new(
                vars,
                ParamsAdagrad {
                    lr,
                    ..ParamsAdagrad::default()
                },
            )?),
        })
    }

    /// Update rule in use
    pub fn kind(&self) -> OptimizerKind {
        match self {
            Self::Sgd(_) => OptimizerKind::Sgd,
            Self::Adam(_) => OptimizerKind::Adam,
            Self::Adagrad(_) => OptimizerKind::Adagrad,
        }
    }

    /// Current learning rate
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Sgd(o) => o.learning_rate(),
            Self::Adam(o) => o.learning_rate(),
            Self::Adagrad(o) => o.learning_rate(),
        }
    }

    /// Apply the gradients found in `grads`; variables without one stay put
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::Sgd(o) => o.step(grads)?,
            Self::Adam(o) => o.step(grads)?,
            Self::Adagrad(o) => o.step(grads)?,
        }
        Ok(())
    }
}
