//! `qa-bench experiments`: list recorded experiment summaries

use qa_bench_core::config::BenchConfig;
use qa_bench_core::error::Result;
use qa_bench_core::eval::ExperimentLog;
use qa_bench_core::report::report_experiments;

use crate::cli::Cli;

pub fn execute(cli: &Cli, config: &BenchConfig) -> Result<()> {
    let log = ExperimentLog::new(&config.results_dir);
    let summaries = log.load_summaries()?;
    tracing::debug!(count = summaries.len(), path = %log.summaries_path().display(), "experiments_loaded");

    println!("{}", report_experiments(&summaries, cli.format)?.trim_end());
    Ok(())
}
