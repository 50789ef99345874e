//! Command dispatch logic for qa-bench

use std::path::Path;
use std::time::Instant;

use qa_bench_core::config::{BenchConfig, CONFIG_FILE_NAME};
use qa_bench_core::error::{BenchError, Result};

use crate::cli::{Cli, Commands};
use crate::commands;

pub fn run(cli: &Cli, start: Instant) -> Result<()> {
    let mut config = load_config(cli)?;
    tracing::debug!(elapsed = ?start.elapsed(), "load_config");

    match &cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            commands::run::execute(cli, &config, args.dry_run)
        }

        Commands::Import { csv, dataset } => {
            dataset.apply(&mut config);
            commands::import::execute(cli, &config, csv)
        }

        Commands::Summarize { dataset } => {
            dataset.apply(&mut config);
            commands::summarize::execute(cli, &config)
        }

        Commands::Experiments { results_dir } => {
            if let Some(dir) = results_dir {
                config.results_dir = dir.clone();
            }
            commands::experiments::execute(cli, &config)
        }
    }
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(cli: &Cli) -> Result<BenchConfig> {
    match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(BenchError::not_found(
                    "config file",
                    path.display().to_string(),
                ));
            }
            BenchConfig::load(path)
        }
        None => BenchConfig::load_or_default(Path::new(CONFIG_FILE_NAME)),
    }
}
