// CLI Interface
//
// Command-line interface for LePlongement: `train` and `probe`.

use crate::config::{RunConfig, DEFAULT_CONFIG_FILE};
use crate::run::{run_probe_files, run_training, ProbeFiles};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lentrainement::TaskKind;
use leplongement::{OptimizerKind, ScoringMode};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// LePlongement - Source Graph Embeddings
#[derive(Parser, Debug)]
#[command(name = "leplongement")]
#[command(author = "LePlongement Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train graph embeddings for source code and probe what they encode", long_about = None)]
pub struct Cli {
    /// Path to the TOML run configuration
    #[arg(global = true, long = "config", short = 'c', default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a graph model and write the run artifacts
    Train(TrainArgs),

    /// Classify names from exported embedding matrices
    Probe {
        /// Input-side embedding matrix
        #[arg(long = "in", value_name = "PATH", default_value = "in_m.txt")]
        input: PathBuf,

        /// Output-side embedding matrix
        #[arg(long = "out", value_name = "PATH", default_value = "out_m.txt")]
        output: PathBuf,

        /// Vocabulary TSV with a `Word` column
        #[arg(long = "voc", value_name = "PATH", default_value = "voc_fnames.tsv")]
        vocabulary: PathBuf,

        /// Names to classify, one per line
        #[arg(long = "allowed", value_name = "PATH", default_value = "reused_call_nodes.txt")]
        allowed: PathBuf,

        /// Write results as JSON to this file
        #[arg(long = "report", value_name = "PATH")]
        report: Option<PathBuf>,
    },
}

/// Overrides for a training run; unset flags keep the configured value
#[derive(clap::Args, Debug, Default)]
pub struct TrainArgs {
    /// Nodes CSV
    #[arg(long = "nodes", value_name = "PATH")]
    pub nodes: Option<PathBuf>,

    /// Edges CSV
    #[arg(long = "edges", value_name = "PATH")]
    pub edges: Option<PathBuf>,

    /// Model architecture (gcn, table); a comma-separated list trains each
    #[arg(long = "model", short = 'm', value_delimiter = ',')]
    pub model: Option<Vec<String>>,

    /// Task (link_prediction, classification)
    #[arg(long = "task", value_parser = parse_task)]
    pub task: Option<TaskKind>,

    /// Number of epochs
    #[arg(long = "epochs", short = 'e')]
    pub epochs: Option<usize>,

    /// Positive pairs per batch
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Negatives per positive
    #[arg(long = "negatives")]
    pub negative_factor: Option<usize>,

    /// Optimizer (sgd, adam, adagrad)
    #[arg(long = "optimizer", value_parser = parse_optimizer)]
    pub optimizer: Option<OptimizerKind>,

    /// Link scoring (dot, classifier)
    #[arg(long = "scoring", value_parser = parse_scoring)]
    pub scoring: Option<ScoringMode>,

    /// Random seed
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Parent directory for run artifacts
    #[arg(long = "output", short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Write a checkpoint here after every epoch
    #[arg(long = "checkpoint", value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    /// Resume from this checkpoint
    #[arg(long = "resume", value_name = "PATH")]
    pub resume: Option<PathBuf>,
}

impl TrainArgs {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(nodes) = &self.nodes {
            config.data.nodes = nodes.clone();
        }
        if let Some(edges) = &self.edges {
            config.data.edges = edges.clone();
        }
        if let Some(models) = &self.model {
            if let Some(first) = models.first() {
                config.model.name = first.clone();
            }
            config.model.grid.name = if models.len() > 1 {
                models.clone()
            } else {
                Vec::new()
            };
        }
        if let Some(task) = self.task {
            config.training.task = task;
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(k) = self.negative_factor {
            config.training.negative_factor = k;
        }
        if let Some(optimizer) = self.optimizer {
            config.training.optimizer = optimizer;
        }
        if let Some(scoring) = self.scoring {
            config.training.scoring = scoring;
        }
        if let Some(seed) = self.seed {
            config.training.seed = seed;
        }
        if let Some(output) = &self.output {
            config.output.dir = output.clone();
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.training.checkpoint_path = Some(checkpoint.clone());
        }
    }
}

fn parse_task(value: &str) -> std::result::Result<TaskKind, String> {
    TaskKind::parse(value).ok_or_else(|| format!("unknown task: {value}"))
}

fn parse_optimizer(value: &str) -> std::result::Result<OptimizerKind, String> {
    OptimizerKind::parse(value).ok_or_else(|| format!("unknown optimizer: {value}"))
}

fn parse_scoring(value: &str) -> std::result::Result<ScoringMode, String> {
    ScoringMode::parse(value).ok_or_else(|| format!("unknown scoring mode: {value}"))
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> Result<()> {
        init_logging_impl(self.verbose);

        let mut config = RunConfig::load(&self.config)?;

        match self.command {
            Commands::Train(args) => {
                args.apply(&mut config);
                cmd_train_impl(config, args.resume).await
            }
            Commands::Probe {
                input,
                output,
                vocabulary,
                allowed,
                report,
            } => {
                let files = ProbeFiles {
                    input,
                    output,
                    vocabulary,
                    allowed,
                };
                cmd_probe_impl(files, config, report).await
            }
        }
    }
}

/// Initialize logging implementation
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects DEBUG over INFO.
fn init_logging_impl(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Train command implementation
///
/// Ctrl+C sets the cancellation flag; the loop then evaluates and the
/// artifacts are written as usual.
async fn cmd_train_impl(config: RunConfig, resume: Option<PathBuf>) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));

    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, finishing with a final evaluation");
                cancel.store(true, Ordering::SeqCst);
            }
        })
    };

    info!(
        model = %config.model.name,
        grid_points = config.model.expand().len(),
        nodes = %config.data.nodes.display(),
        edges = %config.data.edges.display(),
        "Training"
    );

    let flag = Arc::clone(&cancel);
    let summaries = tokio::task::spawn_blocking(move || {
        run_training(&config, resume.as_deref(), &flag)
    })
    .await
    .context("Training task failed")??;
    watcher.abort();

    for summary in &summaries {
        let scores = &summary.scores;
        println!("\n✓ Training complete{}", if scores.interrupted { " (interrupted)" } else { "" });
        println!("  Epochs: {}", scores.epochs_completed);
        println!("  Loss: {:.4}", scores.loss);
        println!("  Train Acc: {:.4}", scores.train_acc);
        println!("  Val Acc: {:.4}", scores.val_acc);
        println!("  Test Acc: {:.4}", scores.test_acc);
        println!(
            "  Best Val Acc: {:.4} (Test {:.4})",
            scores.best_val_acc, scores.best_test_acc
        );
        println!("  Artifacts: {}", summary.run_dir.display());
    }

    Ok(())
}

/// Probe command implementation
async fn cmd_probe_impl(
    files: ProbeFiles,
    config: RunConfig,
    report: Option<PathBuf>,
) -> Result<()> {
    let probe = config.probe;
    let results = tokio::task::spawn_blocking(move || run_probe_files(&files, &probe))
        .await
        .context("Probe task failed")??;

    for result in &results {
        println!(
            "reps={}, names={}, hidden={:?}: accuracy {:.4}",
            result.representation, result.label, result.hidden_layers, result.accuracy
        );
    }

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&results).context("Failed to serialize probe results")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write probe report: {:?}", path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_args(argv: &[&str]) -> TrainArgs {
        let mut full = vec!["leplongement", "train"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse").command {
            Commands::Train(args) => args,
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_model_list_becomes_grid() {
        let mut config = RunConfig::default();
        train_args(&["--model", "gcn,table"]).apply(&mut config);
        assert_eq!(config.model.name, "gcn");
        assert_eq!(config.model.grid.name, vec!["gcn", "table"]);
        assert_eq!(config.model.expand().len(), 2);

        train_args(&["--model", "table"]).apply(&mut config);
        assert_eq!(config.model.name, "table");
        assert!(config.model.grid.is_empty());
    }

    #[test]
    fn test_unknown_optimizer_is_rejected() {
        let args = ["leplongement", "train", "--optimizer", "sparse_adam"];
        assert!(Cli::try_parse_from(args).is_err());
        let mut config = RunConfig::default();
        train_args(&["--optimizer", "adagrad"]).apply(&mut config);
        assert_eq!(config.training.optimizer, OptimizerKind::Adagrad);
    }
}
