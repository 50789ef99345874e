//! `qa-bench summarize`: describe a dataset

use qa_bench_core::config::BenchConfig;
use qa_bench_core::dataset::DatasetStore;
use qa_bench_core::error::Result;

use crate::cli::{Cli, OutputFormat};

pub fn execute(cli: &Cli, config: &BenchConfig) -> Result<()> {
    let store = DatasetStore::open(
        &config.dataset.root,
        &config.dataset.project,
        &config.dataset.name,
    )?;
    let summary = store.summarize();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Human => print!("{}", summary),
    }
    Ok(())
}
