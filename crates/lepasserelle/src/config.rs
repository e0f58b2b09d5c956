// Run Configuration
//
// *La Configuration* (The Configuration) - TOML settings for a training run

use anyhow::{Context, Result};
use lemodele::ModelConfig;
use lentrainement::{ProbeConfig, TrainingConfig};
use leplongement::ElementConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "leplongement.toml";

/// Full run configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Input files
    pub data: DataConfig,

    /// Graph model architecture
    pub model: ModelConfig,

    /// Element store used by link prediction
    pub elements: ElementConfig,

    /// Training loop settings
    pub training: TrainingConfig,

    /// Artifact settings
    pub output: OutputConfig,

    /// Embedding probe settings
    pub probe: ProbeConfig,
}

/// Graph input files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Nodes CSV (`id,type,serialized_name`)
    pub nodes: PathBuf,

    /// Edges CSV (`type,source_node_id,target_node_id`)
    pub edges: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            nodes: PathBuf::from("nodes.csv"),
            edges: PathBuf::from("edges.csv"),
        }
    }
}

/// Where and what to write after a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Parent of the per-run directories
    pub dir: PathBuf,

    /// Export node and element embeddings as text matrices
    pub write_embeddings: bool,

    /// Write a final checkpoint into the run directory
    pub write_checkpoint: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
            write_embeddings: true,
            write_checkpoint: true,
        }
    }
}

impl RunConfig {
    /// Load configuration from a file
    ///
    /// A missing file yields the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(RunConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lentrainement::TaskKind;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = RunConfig::load("/nonexistent/leplongement.toml").unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            "[model]\nname = \"table\"\n\n[training]\nepochs = 7\ntask = \"classification\"\n",
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.model.name, "table");
        assert_eq!(config.model.hidden_dim, ModelConfig::default().hidden_dim);
        assert_eq!(config.training.epochs, 7);
        assert_eq!(config.training.task, TaskKind::Classification);
        assert_eq!(config.training.batch_size, 4096);
        assert_eq!(config.elements.emb_size, 100);
    }

    #[test]
    fn test_model_grid_section() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            "[model]\nname = \"gcn\"\n\n[model.grid]\nname = [\"gcn\", \"table\"]\nhidden_dim = [16, 32]\n",
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        let points = config.model.expand();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].name, "gcn");
        assert_eq!(points[1].hidden_dim, 32);
        assert_eq!(points[3].name, "table");
        assert!(points.iter().all(|p| p.grid.is_empty()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("run.toml");
        let mut config = RunConfig::default();
        config.training.checkpoint_path = Some(PathBuf::from("ckpt.bin"));
        config.output.write_embeddings = false;
        config.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[training\nepochs = ").unwrap();
        assert!(RunConfig::load(&path).is_err());
    }
}
