// Integration Tests for LePasserelle
//
// CLI parsing, config overrides, and full training and probe runs on small
// on-disk datasets.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

fn write_graph(dir: &Path) -> (PathBuf, PathBuf) {
    let nodes = dir.join("nodes.csv");
    let edges = dir.join("edges.csv");

    let mut node_rows = String::from("id,type,serialized_name\n");
    let mut edge_rows = String::from("type,source_node_id,target_node_id\n");
    let mut id = 0;
    for module in ["core", "util", "web"] {
        let module_id = id;
        node_rows.push_str(&format!("{id},module,{module}\n"));
        id += 1;
        for func in ["load", "save", "parse", "render"] {
            node_rows.push_str(&format!("{id},function,{module}.{func}\n"));
            edge_rows.push_str(&format!("contains,{module_id},{id}\n"));
            id += 1;
        }
    }
    edge_rows.push_str("call,1,6\ncall,6,11\ncall,2,7\n");

    fs::write(&nodes, node_rows).expect("write nodes");
    fs::write(&edges, edge_rows).expect("write edges");
    (nodes, edges)
}

mod cli_parsing_tests {
    use super::*;
    use clap::Parser;
    use lepasserelle::cli::{Cli, Commands};
    use lepasserelle::RunConfig;
    use lentrainement::TaskKind;
    use leplongement::OptimizerKind;

    #[test]
    fn test_train_flags_override_config() {
        let cli = Cli::parse_from([
            "leplongement",
            "train",
            "--nodes",
            "/data/nodes.csv",
            "--model",
            "table",
            "--task",
            "classification",
            "--epochs",
            "12",
            "--optimizer",
            "adagrad",
        ]);

        let Commands::Train(args) = cli.command else {
            panic!("Expected Train command");
        };
        let mut config = RunConfig::default();
        args.apply(&mut config);

        assert_eq!(config.data.nodes, PathBuf::from("/data/nodes.csv"));
        assert_eq!(config.data.edges, PathBuf::from("edges.csv"));
        assert_eq!(config.model.name, "table");
        assert_eq!(config.training.task, TaskKind::Classification);
        assert_eq!(config.training.epochs, 12);
        assert_eq!(config.training.optimizer, OptimizerKind::Adagrad);
        assert_eq!(config.training.batch_size, 4096);
    }

    #[test]
    fn test_unknown_task_rejected_by_parser() {
        let result = Cli::try_parse_from(["leplongement", "train", "--task", "regression"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_probe_defaults() {
        let cli = Cli::parse_from(["leplongement", "--verbose", "probe"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Probe {
                input, vocabulary, ..
            } => {
                assert_eq!(input, PathBuf::from("in_m.txt"));
                assert_eq!(vocabulary, PathBuf::from("voc_fnames.tsv"));
            }
            _ => panic!("Expected Probe command"),
        }
    }
}

mod pipeline_tests {
    use super::*;
    use candle_core::Device;
    use lemodele::Checkpoint;
    use lepasserelle::{run_probe_files, run_training, ProbeFiles, RunConfig};
    use lentrainement::{ProbeConfig, TaskKind};
    use rstest::rstest;

    fn small_config(dir: &Path, task: TaskKind) -> RunConfig {
        let (nodes, edges) = write_graph(dir);
        let mut config = RunConfig::default();
        config.data.nodes = nodes;
        config.data.edges = edges;
        config.model.input_dim = 8;
        config.model.hidden_dim = 8;
        config.elements.emb_size = 8;
        config.training.task = task;
        config.training.epochs = 2;
        config.training.batch_size = 4;
        config.output.dir = dir.join("runs");
        config
    }

    #[test]
    fn test_link_prediction_run_writes_artifacts() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = small_config(temp.path(), TaskKind::LinkPrediction);

        let summaries = run_training(&config, None, &AtomicBool::new(false)).expect("run");
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.history.len(), 2);
        assert!(summary.run_dir.starts_with(temp.path().join("runs")));
        assert!(summary
            .run_dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("gcn-")));

        for artifact in [
            "config.toml",
            "scores.json",
            "node_embeddings.txt",
            "element_embeddings.txt",
            "elements.tsv",
            "checkpoint.bin",
        ] {
            assert!(summary.run_dir.join(artifact).exists(), "missing {artifact}");
        }

        let scores: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(summary.run_dir.join("scores.json")).expect("scores"),
        )
        .expect("json");
        assert_eq!(scores["model"], "gcn");
        assert_eq!(scores["task"], "link_prediction");
        assert_eq!(scores["history"].as_array().map(Vec::len), Some(2));

        let device = Device::Cpu;
        let nodes =
            legraphe::read_matrix_text(&summary.run_dir.join("node_embeddings.txt"), &device)
                .expect("node embeddings");
        assert_eq!(nodes.dims(), &[15, 8]);

        let words = legraphe::read_vocabulary(&summary.run_dir.join("elements.tsv"))
            .expect("vocabulary");
        let elements =
            legraphe::read_matrix_text(&summary.run_dir.join("element_embeddings.txt"), &device)
                .expect("element embeddings");
        assert_eq!(words.len(), elements.dims()[0]);
        assert!(words.contains(&"render".to_string()));

        let checkpoint = Checkpoint::load(&summary.run_dir.join("checkpoint.bin")).expect("ckpt");
        assert_eq!(checkpoint.epoch, Some(1));
        assert_eq!(checkpoint.best.best_val_acc, summary.scores.best_val_acc);
        assert_eq!(checkpoint.best.best_epoch, summary.scores.best_epoch);
    }

    #[test]
    fn test_classification_run_skips_element_files() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut config = small_config(temp.path(), TaskKind::Classification);
        config.model.name = "table".to_string();

        let summaries = run_training(&config, None, &AtomicBool::new(false)).expect("run");
        assert!(summaries[0].run_dir.join("node_embeddings.txt").exists());
        assert!(!summaries[0].run_dir.join("element_embeddings.txt").exists());
    }

    #[test]
    fn test_model_grid_writes_one_run_per_point() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut config = small_config(temp.path(), TaskKind::LinkPrediction);
        config.training.epochs = 1;
        config.model.grid.name = vec!["gcn".to_string(), "table".to_string()];
        config.model.grid.hidden_dim = vec![4, 8];

        let summaries = run_training(&config, None, &AtomicBool::new(false)).expect("run");
        assert_eq!(summaries.len(), 4);

        let mut dirs: Vec<&PathBuf> = summaries.iter().map(|s| &s.run_dir).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 4, "every grid point gets its own directory");

        let names: Vec<String> = summaries
            .iter()
            .map(|s| {
                let saved = RunConfig::load(s.run_dir.join("config.toml")).expect("config");
                assert!(saved.model.grid.is_empty());
                format!("{}/{}", saved.model.name, saved.model.hidden_dim)
            })
            .collect();
        assert_eq!(names, vec!["gcn/4", "gcn/8", "table/4", "table/8"]);
    }

    #[test]
    fn test_resume_rejects_multi_point_grid() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut config = small_config(temp.path(), TaskKind::LinkPrediction);
        config.model.grid.name = vec!["gcn".to_string(), "table".to_string()];
        let missing = temp.path().join("none.bin");
        let err = run_training(&config, Some(&missing), &AtomicBool::new(false)).unwrap_err();
        assert!(err.to_string().contains("single model"));
    }

    #[test]
    fn test_cancel_before_first_epoch_checkpoints_no_epoch() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut config = small_config(temp.path(), TaskKind::LinkPrediction);
        config.model.grid.name = vec!["gcn".to_string(), "table".to_string()];

        let summaries = run_training(&config, None, &AtomicBool::new(true)).expect("run");
        assert_eq!(summaries.len(), 1, "later grid points are skipped");
        assert!(summaries[0].scores.interrupted);

        let path = summaries[0].run_dir.join("checkpoint.bin");
        let checkpoint = Checkpoint::load(&path).expect("ckpt");
        assert_eq!(checkpoint.epoch, None);
        assert_eq!(checkpoint.next_epoch(), 0);

        // resuming it trains from epoch 0
        config.model.grid.name.clear();
        let resumed = run_training(&config, Some(&path), &AtomicBool::new(false)).expect("resume");
        let epochs: Vec<usize> = resumed[0].history.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![0, 1]);
    }

    #[rstest]
    #[case("rgcn")]
    #[case("gat")]
    fn test_unknown_model_fails_with_name(#[case] name: &str) {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut config = small_config(temp.path(), TaskKind::LinkPrediction);
        config.model.name = name.to_string();

        let err = run_training(&config, None, &AtomicBool::new(false)).unwrap_err();
        assert!(format!("{err:#}").contains(name));
    }

    #[test]
    fn test_probe_on_exported_matrices() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let dir = temp.path();
        let names = [
            "core.load", "core.save", "util.load", "util.save", "web.load", "web.save",
            "core.parse", "util.parse", "web.parse", "core.render",
        ];

        let rows: String = (0..names.len())
            .map(|i| format!("{} {} {}\n", i as f32 * 0.1, 1.0 - i as f32 * 0.1, 0.5))
            .collect();
        fs::write(dir.join("in.txt"), &rows).expect("in");
        fs::write(dir.join("out.txt"), &rows).expect("out");

        let mut voc = String::from("Word\tCount\n");
        for name in names {
            voc.push_str(&format!("{name}\t1\n"));
        }
        fs::write(dir.join("voc.tsv"), voc).expect("voc");
        fs::write(dir.join("allowed.txt"), "core.load\nweb.parse\nmissing.name\ncore.save\nutil.load\nutil.parse\nweb.save\n")
            .expect("allowed");

        let files = ProbeFiles {
            input: dir.join("in.txt"),
            output: dir.join("out.txt"),
            vocabulary: dir.join("voc.tsv"),
            allowed: dir.join("allowed.txt"),
        };
        let config = ProbeConfig {
            hidden_layers: vec![vec![4]],
            iterations: 10,
            ..ProbeConfig::default()
        };
        let results = run_probe_files(&files, &config).expect("probe");
        assert_eq!(results.len(), 4);
        assert_eq!(
            results
                .iter()
                .map(|r| (r.representation.as_str(), r.label.as_str()))
                .collect::<Vec<_>>(),
            vec![("in", "function"), ("out", "function"), ("in", "module"), ("out", "module")]
        );
    }
}
