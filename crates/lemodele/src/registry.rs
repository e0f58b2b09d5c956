// Architecture selection by name

use crate::error::{ModelError, Result};
use crate::gcn::{GraphConvolution, GCN_NAME};
use crate::model::GraphModel;
use crate::table::{NodeTable, TABLE_NAME};
use legraphe::SourceGraph;
use leplongement::ParamStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Known architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Two-layer normalized graph convolution
    Gcn,
    /// Free per-node embedding table
    Table,
}

impl ModelKind {
    /// Resolve a registry name
    ///
    /// Anything other than `gcn` or `table` is rejected with the name echoed
    /// back, including `gat` and `rgcn`.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            GCN_NAME => Ok(ModelKind::Gcn),
            TABLE_NAME => Ok(ModelKind::Table),
            _ => Err(ModelError::UnknownModel(name.to_string())),
        }
    }

    /// Registry name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Gcn => GCN_NAME,
            ModelKind::Table => TABLE_NAME,
        }
    }
}

/// Value lists swept over by [`ModelConfig::expand`]
///
/// An empty list keeps the base value of that field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelGrid {
    /// Architecture names
    pub name: Vec<String>,
    /// Input feature widths
    pub input_dim: Vec<usize>,
    /// Hidden layer widths
    pub hidden_dim: Vec<usize>,
}

impl ModelGrid {
    /// True if no field is swept
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.input_dim.is_empty() && self.hidden_dim.is_empty()
    }
}

/// Model hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Architecture name
    pub name: String,
    /// Width of the trainable input features (gcn)
    pub input_dim: usize,
    /// Hidden layer width (gcn)
    pub hidden_dim: usize,
    /// Optional sweep; every combination becomes its own run
    #[serde(skip_serializing_if = "ModelGrid::is_empty")]
    pub grid: ModelGrid,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: GCN_NAME.to_string(),
            input_dim: 100,
            hidden_dim: 64,
            grid: ModelGrid::default(),
        }
    }
}

impl ModelConfig {
    /// Every grid point as a plain config, grid cleared
    ///
    /// Names vary slowest, then hidden widths, then input widths. Without a
    /// grid the result is the config itself.
    pub fn expand(&self) -> Vec<ModelConfig> {
        fn or_base<T: Clone>(values: &[T], base: &T) -> Vec<T> {
            if values.is_empty() {
                vec![base.clone()]
            } else {
                values.to_vec()
            }
        }

        let names = or_base(&self.grid.name, &self.name);
        let hidden = or_base(&self.grid.hidden_dim, &self.hidden_dim);
        let input = or_base(&self.grid.input_dim, &self.input_dim);

        let mut points = Vec::with_capacity(names.len() * hidden.len() * input.len());
        for name in &names {
            for &hidden_dim in &hidden {
                for &input_dim in &input {
                    points.push(ModelConfig {
                        name: name.clone(),
                        input_dim,
                        hidden_dim,
                        grid: ModelGrid::default(),
                    });
                }
            }
        }
        points
    }
}

/// Build the configured architecture for `graph`
///
/// `out_dim` is the width of the node embeddings: the number of classes for
/// node classification, the element embedding width for link prediction.
/// The model's variables are registered in `params` under `<name>.`.
pub fn build_model<R: Rng + ?Sized>(
    config: &ModelConfig,
    graph: &SourceGraph,
    out_dim: usize,
    params: &ParamStore,
    rng: &mut R,
) -> Result<Box<dyn GraphModel>> {
    let kind = ModelKind::parse(&config.name)?;
    let model: Box<dyn GraphModel> = match kind {
        ModelKind::Gcn => Box::new(GraphConvolution::new(
            graph.normalized_adjacency(params.device())?,
            config.input_dim,
            config.hidden_dim,
            out_dim,
            params,
            rng,
        )?),
        ModelKind::Table => Box::new(NodeTable::new(graph.node_count(), out_dim, params, rng)?),
    };
    let prefix = format!("{}.", kind.as_str());
    let parameters = params.num_parameters(|name| name.starts_with(&prefix))?;
    info!(
        model = kind.as_str(),
        nodes = model.num_nodes(),
        out_dim,
        parameters,
        "Built graph model"
    );
    Ok(model)
}
