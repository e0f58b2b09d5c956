// Trainable parameters
//
// Every trainable tensor lives in one `VarMap` under a dotted name. Components
// keep tensor handles to their variables; optimizers update the variables in
// place, so the handles always see the current values. Initial values are
// drawn from a caller-supplied rng so seeded runs start identically.

use crate::error::{EmbeddingError, Result};
use candle_core::{DType, Device, Shape, Tensor, Var};
use candle_nn::{Linear, VarBuilder, VarMap};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::MutexGuard;

/// Named parameter snapshot, ordered by name
pub type StateDict = BTreeMap<String, TensorData>;

/// Detached copy of one parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    /// Dimensions of the tensor
    pub shape: Vec<usize>,
    /// Values in row-major order
    pub values: Vec<f32>,
}

impl TensorData {
    /// Copy the values out of a tensor
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        Ok(Self {
            shape: tensor.dims().to_vec(),
            values: tensor
                .to_dtype(DType::F32)?
                .flatten_all()?
                .to_vec1::<f32>()?,
        })
    }

    /// Rebuild a tensor on `device`
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_vec(
            self.values.clone(),
            self.shape.clone(),
            device,
        )?)
    }
}

/// Shared registry of trainable variables
///
/// Cloning the store clones a handle; both clones see the same variables.
#[derive(Clone)]
pub struct ParamStore {
    varmap: VarMap,
    device: Device,
}

impl fmt::Debug for ParamStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamStore")
            .field("device", &self.device)
            .field("variables", &self.varmap.all_vars().len())
            .finish()
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new(Device::Cpu)
    }
}

impl ParamStore {
    /// Empty store placing tensors on `device`
    pub fn new(device: Device) -> Self {
        Self {
            varmap: VarMap::new(),
            device,
        }
    }

    /// Device of every variable
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Underlying variable map
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Builder resolving names against this store
    pub fn var_builder(&self) -> VarBuilder<'static> {
        VarBuilder::from_varmap(&self.varmap, DType::F32, &self.device)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Var>>> {
        self.varmap
            .data()
            .lock()
            .map_err(|_| EmbeddingError::Poisoned)
    }

    /// Register `value` as a trainable variable and return its handle
    ///
    /// An existing variable with the same name is replaced.
    pub fn insert(&self, name: &str, value: &Tensor) -> Result<Tensor> {
        let var = Var::from_tensor(&value.to_dtype(DType::F32)?)?;
        let handle = var.as_tensor().clone();
        self.lock()?.insert(name.to_string(), var);
        Ok(handle)
    }

    /// Register a variable drawn uniformly from `[-bound, bound)`
    pub fn uniform<S, R>(&self, name: &str, shape: S, bound: f32, rng: &mut R) -> Result<Tensor>
    where
        S: Into<Shape>,
        R: Rng + ?Sized,
    {
        let shape: Shape = shape.into();
        let values: Vec<f32> = (0..shape.elem_count())
            .map(|_| {
                if bound > 0.0 {
                    rng.gen_range(-bound..bound)
                } else {
                    0.0
                }
            })
            .collect();
        let value = Tensor::from_vec(values, shape, &self.device)?;
        self.insert(name, &value)
    }

    /// Linear layer `name.weight` (out x in) and `name.bias` (out)
    ///
    /// Both are drawn from `U(-1/sqrt(in), 1/sqrt(in))`, the usual default
    /// for fully connected layers.
    pub fn linear<R: Rng + ?Sized>(
        &self,
        name: &str,
        in_dim: usize,
        out_dim: usize,
        rng: &mut R,
    ) -> Result<Linear> {
        let bound = 1.0 / (in_dim.max(1) as f32).sqrt();
        self.uniform(&format!("{name}.weight"), (out_dim, in_dim), bound, rng)?;
        self.uniform(&format!("{name}.bias"), out_dim, bound, rng)?;
        Ok(candle_nn::linear(in_dim, out_dim, self.var_builder().pp(name))?)
    }

    /// Handle of a registered variable
    pub fn get(&self, name: &str) -> Result<Tensor> {
        self.lock()?
            .get(name)
            .map(|var| var.as_tensor().clone())
            .ok_or_else(|| EmbeddingError::MissingParameter(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Variables whose name satisfies `keep`, in name order
    pub fn vars_matching<F: Fn(&str) -> bool>(&self, keep: F) -> Result<Vec<Var>> {
        let map = self.lock()?;
        let mut selected: Vec<(&String, &Var)> =
            map.iter().filter(|(name, _)| keep(name.as_str())).collect();
        selected.sort_by(|a, b| a.0.cmp(b.0));
        Ok(selected.into_iter().map(|(_, var)| var.clone()).collect())
    }

    /// Total number of scalars over names satisfying `keep`
    pub fn num_parameters<F: Fn(&str) -> bool>(&self, keep: F) -> Result<usize> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(name, _)| keep(name.as_str()))
            .map(|(_, var)| var.elem_count())
            .sum())
    }

    /// Snapshot every variable by name
    pub fn state_dict(&self) -> Result<StateDict> {
        self.lock()?
            .iter()
            .map(|(name, var)| Ok((name.clone(), TensorData::from_tensor(var.as_tensor())?)))
            .collect()
    }

    /// Overwrite every registered variable from `state`
    ///
    /// Entries without a registered variable are ignored. A registered
    /// variable missing from `state`, or stored with another shape, is an
    /// error and leaves the remaining variables untouched.
    pub fn load_state_dict(&self, state: &StateDict) -> Result<()> {
        let map = self.lock()?;
        let mut updates = Vec::with_capacity(map.len());
        for (name, var) in map.iter() {
            let data = state
                .get(name)
                .ok_or_else(|| EmbeddingError::MissingParameter(name.clone()))?;
            if data.shape.as_slice() != var.dims() {
                return Err(EmbeddingError::ShapeMismatch {
                    op: "load_state_dict",
                    left: var.dims().to_vec(),
                    right: data.shape.clone(),
                });
            }
            updates.push((var, data.to_tensor(&self.device)?));
        }
        for (var, value) in updates {
            var.set(&value)?;
        }
        Ok(())
    }
}
