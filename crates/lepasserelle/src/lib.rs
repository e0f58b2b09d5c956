// lepasserelle - Command Line Bridge
//
// *La Passerelle* (The Bridge) - configuration, logging, interrupt wiring and
// run artifacts around the training and probe pipelines

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Command-line interface.
pub mod cli;
/// TOML run configuration.
pub mod config;
/// Training and probe pipelines with their artifacts.
pub mod run;

pub use config::RunConfig;
pub use run::{run_probe_files, run_training, ProbeFiles, RunSummary};
