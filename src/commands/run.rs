//! `qa-bench run`: evaluate the configuration grid

use std::sync::Arc;
use std::time::Instant;

use qa_bench_core::client::openai::api_key_from_env;
use qa_bench_core::client::{DecodingMode, MockClient, ModelClient, OpenAiClient};
use qa_bench_core::config::BenchConfig;
use qa_bench_core::dataset::DatasetStore;
use qa_bench_core::error::{BenchError, Result};
use qa_bench_core::eval::{Evaluator, ExperimentLog};
use qa_bench_core::grader::{load_grader_prompt, VerdictGrader};
use qa_bench_core::grid::{ClientFactory, GridRunner};
use qa_bench_core::report::report;
use qa_bench_core::trace_time;

use crate::cli::Cli;

pub fn execute(cli: &Cli, config: &BenchConfig, dry_run: bool) -> Result<()> {
    config.validate()?;

    let store = DatasetStore::open(
        &config.dataset.root,
        &config.dataset.project,
        &config.dataset.name,
    )?;
    let data = store.take(Some(config.max_items));
    if data.is_empty() {
        return Err(BenchError::not_found(
            "dataset records",
            format!("{}/{}", config.dataset.project, config.dataset.name),
        ));
    }

    // Loaded once, shared read-only by every cell
    let prompt_prefix = load_grader_prompt(&config.grader_prompt)?;
    let (factory, judge) = clients(config, dry_run)?;

    let grader = Arc::new(VerdictGrader::new(
        judge,
        config.judge_model.clone(),
        prompt_prefix,
    ));
    let sink = Evaluator::new().with_log(ExperimentLog::new(&config.results_dir));
    let runner = GridRunner::new(
        config.eval_name.clone(),
        config.model.clone(),
        factory,
        grader,
        Arc::new(sink),
    );

    if !cli.quiet {
        eprintln!(
            "Running {} configuration(s) over {} item(s){}",
            config.modes.len() * config.contracts.len(),
            data.len(),
            if dry_run { " (dry run)" } else { "" }
        );
    }

    let start = Instant::now();
    let runtime = tokio::runtime::Runtime::new()?;
    let summaries = runtime.block_on(runner.run_grid(
        &data,
        &config.modes,
        &config.contracts,
        config.max_concurrency,
    ))?;
    trace_time!(start, "run_command");

    println!("{}", report(&summaries, cli.format)?.trim_end());

    if summaries.is_empty() {
        return Err(BenchError::Other(
            "every configuration cell failed; see log output".to_string(),
        ));
    }
    Ok(())
}

/// Generator client factory and judge client for this run.
fn clients(
    config: &BenchConfig,
    dry_run: bool,
) -> Result<(Arc<dyn ClientFactory>, Arc<dyn ModelClient>)> {
    if dry_run {
        let factory = |mode: DecodingMode| -> Result<Arc<dyn ModelClient>> {
            Ok(Arc::new(MockClient::offline(mode)))
        };
        let factory: Arc<dyn ClientFactory> = Arc::new(factory);
        let judge: Arc<dyn ModelClient> = Arc::new(MockClient::offline(config.judge_mode));
        return Ok((factory, judge));
    }

    let api_key = api_key_from_env()?;
    let base = OpenAiClient::new(
        &config.api_base,
        api_key,
        config.judge_mode,
        config.request_timeout(),
    )?;
    let judge: Arc<dyn ModelClient> = Arc::new(base.clone());
    let factory = move |mode: DecodingMode| -> Result<Arc<dyn ModelClient>> {
        Ok(Arc::new(base.with_mode(mode)))
    };
    let factory: Arc<dyn ClientFactory> = Arc::new(factory);
    Ok((factory, judge))
}
