// Training and probe pipelines
//
// Wires the loaders, model registry, task and trainer together and writes the
// run artifacts. Every point of the model grid is trained separately, in grid
// order, into its own directory:
//
//   <output.dir>/<model>-<timestamp>[-<n>]/
//     config.toml              effective configuration
//     scores.json              final scores and per-epoch history
//     node_embeddings.txt      model output, one row per node
//     element_embeddings.txt   element table (link prediction)
//     elements.tsv             element vocabulary in table row order
//     checkpoint.bin           final parameters

use anyhow::{bail, Context, Result};
use candle_core::Device;
use chrono::Local;
use legraphe::{
    allowed_name_ids, load_graph, read_allowed_names, read_matrix_text, read_vocabulary,
    write_matrix_text, write_vocabulary, Splits,
};
use lemodele::{build_model, Checkpoint};
use lentrainement::{
    run_probe, EpochReport, ProbeConfig, ProbeResult, Scores, Task, TaskKind, Trainer,
    TrainingOutcome,
};
use leplongement::ParamStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::config::RunConfig;

/// What a training run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Directory holding the artifacts
    pub run_dir: PathBuf,
    /// Final scores
    pub scores: Scores,
    /// Per-epoch metrics
    pub history: Vec<EpochReport>,
}

/// Train every configured model and write one artifact directory each
///
/// Grid points run in [`ModelConfig::expand`] order with the same seed.
/// `resume` restores parameters from a checkpoint before training and is
/// only accepted for a single grid point. Once `cancel` is set the current
/// run stops early and writes its artifacts; later grid points are skipped.
/// The first point always runs, so a preset flag still leaves artifacts.
///
/// [`ModelConfig::expand`]: lemodele::ModelConfig::expand
pub fn run_training(
    config: &RunConfig,
    resume: Option<&Path>,
    cancel: &AtomicBool,
) -> Result<Vec<RunSummary>> {
    let points = config.model.expand();
    if resume.is_some() && points.len() > 1 {
        bail!(
            "--resume needs a single model configuration, the grid has {} points",
            points.len()
        );
    }

    let mut summaries = Vec::with_capacity(points.len());
    for (index, model) in points.into_iter().enumerate() {
        if index > 0 && cancel.load(Ordering::SeqCst) {
            warn!(completed = summaries.len(), "Cancelled, skipping remaining grid points");
            break;
        }
        info!(
            point = index + 1,
            model = %model.name,
            input_dim = model.input_dim,
            hidden_dim = model.hidden_dim,
            "Grid point"
        );
        let point = RunConfig {
            model,
            ..config.clone()
        };
        summaries.push(run_single(&point, resume, cancel)?);
    }
    Ok(summaries)
}

fn run_single(config: &RunConfig, resume: Option<&Path>, cancel: &AtomicBool) -> Result<RunSummary> {
    let (graph, _) = load_graph(&config.data.nodes, &config.data.edges)
        .context("Failed to load source graph")?;

    let mut rng = StdRng::seed_from_u64(config.training.seed);
    let params = ParamStore::default();
    let node_dim = Task::node_dim(config.training.task, &graph, &config.elements);
    let model = build_model(&config.model, &graph, node_dim, &params, &mut rng)
        .context("Failed to build graph model")?;

    let task = match config.training.task {
        TaskKind::Classification => Task::classification(&graph),
        TaskKind::LinkPrediction => Task::link_prediction(
            &graph,
            &config.elements,
            config.training.scoring,
            node_dim,
            config.training.negative_factor,
            &params,
            &mut rng,
        )
        .context("Failed to build link prediction task")?,
    };

    let splits = Splits::random(
        graph.node_count(),
        config.training.train_fraction,
        config.training.test_fraction,
        &mut rng,
    )?;

    let mut trainer = Trainer::new(config.training.clone(), model, task, params, splits);
    if let Some(path) = resume {
        let checkpoint = Checkpoint::load(path)
            .with_context(|| format!("Failed to load checkpoint: {:?}", path))?;
        trainer.resume_from(&checkpoint)?;
    }

    let outcome = trainer.run(cancel).context("Training failed")?;
    let run_dir = run_directory(&config.output.dir, &config.model.name);
    write_artifacts(config, &run_dir, outcome)
}

/// `<parent>/<model>-<timestamp>`, suffixed with `-<n>` if already taken
fn run_directory(parent: &Path, model_name: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let base = format!("{model_name}-{stamp}");
    let mut candidate = parent.join(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = parent.join(format!("{base}-{n}"));
        n += 1;
    }
    candidate
}

#[derive(Serialize)]
struct ScoreReport<'a> {
    model: &'a str,
    task: TaskKind,
    scores: &'a Scores,
    history: &'a [EpochReport],
}

fn write_artifacts(
    config: &RunConfig,
    run_dir: &Path,
    outcome: TrainingOutcome,
) -> Result<RunSummary> {
    let checkpoint = if config.output.write_checkpoint {
        Some(outcome.checkpoint()?)
    } else {
        None
    };
    let TrainingOutcome {
        scores,
        history,
        model,
        task,
        ..
    } = outcome;

    fs::create_dir_all(run_dir)
        .with_context(|| format!("Failed to create run directory: {:?}", run_dir))?;
    config.save(run_dir.join("config.toml"))?;

    let report = ScoreReport {
        model: model.name(),
        task: task.kind(),
        scores: &scores,
        history: &history,
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize scores")?;
    fs::write(run_dir.join("scores.json"), json).context("Failed to write scores")?;

    if config.output.write_embeddings {
        let nodes = model.forward().context("Failed to compute node embeddings")?;
        write_matrix_text(&run_dir.join("node_embeddings.txt"), &nodes)?;

        if let Task::LinkPrediction(link) = &task {
            write_matrix_text(&run_dir.join("element_embeddings.txt"), link.store.table())?;
            write_vocabulary(&run_dir.join("elements.tsv"), link.store.elem2id().values())?;
        }
    }

    if let Some(checkpoint) = checkpoint {
        checkpoint.save(&run_dir.join("checkpoint.bin"))?;
    }

    info!(
        run_dir = %run_dir.display(),
        test_acc = scores.test_acc,
        best_val_acc = scores.best_val_acc,
        "Run complete"
    );
    Ok(RunSummary {
        run_dir: run_dir.to_path_buf(),
        scores,
        history,
    })
}

/// Inputs of the embedding probe
#[derive(Debug, Clone)]
pub struct ProbeFiles {
    /// Input-side embedding matrix
    pub input: PathBuf,
    /// Output-side embedding matrix
    pub output: PathBuf,
    /// Tab-separated vocabulary with a `Word` column
    pub vocabulary: PathBuf,
    /// Newline-separated names to classify
    pub allowed: PathBuf,
}

/// Load the probe inputs and classify the selected rows
pub fn run_probe_files(files: &ProbeFiles, config: &ProbeConfig) -> Result<Vec<ProbeResult>> {
    info!("Loading embeddings");
    let device = Device::Cpu;
    let input = read_matrix_text(&files.input, &device)?;
    let output = read_matrix_text(&files.output, &device)?;
    let vocabulary = read_vocabulary(&files.vocabulary)?;
    let allowed = read_allowed_names(&files.allowed)?;

    let named_rows = allowed_name_ids(&vocabulary, &allowed);
    info!(
        allowed = allowed.len(),
        found = named_rows.len(),
        "Selected names present in the vocabulary"
    );

    run_probe(&input, &output, &named_rows, config).context("Embedding probe failed")
}
