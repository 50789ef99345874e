//! `qa-bench import`: load a CSV file into a dataset

use std::path::Path;

use qa_bench_core::config::BenchConfig;
use qa_bench_core::dataset::{import_csv, DatasetStore};
use qa_bench_core::error::{BenchError, Result};
use serde_json::json;

use crate::cli::{Cli, OutputFormat};

pub fn execute(cli: &Cli, config: &BenchConfig, csv_path: &Path) -> Result<()> {
    if !csv_path.exists() {
        return Err(BenchError::not_found(
            "csv file",
            csv_path.display().to_string(),
        ));
    }

    let mut store = DatasetStore::init_or_load(
        &config.dataset.root,
        &config.dataset.project,
        &config.dataset.name,
    )?;
    let imported = import_csv(&mut store, csv_path)?;
    let summary = store.summarize();

    match cli.format {
        OutputFormat::Json => {
            let output = json!({
                "imported": imported,
                "dataset": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            if !cli.quiet {
                println!("Imported {} record(s) from {}", imported, csv_path.display());
            }
            print!("{}", summary);
        }
    }
    Ok(())
}
