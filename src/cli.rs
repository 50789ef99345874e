//! CLI argument parsing for qa-bench
//!
//! Supports global flags: --config, --format, --quiet, --verbose, --log-level, --log-json

mod parse;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use qa_bench_core::client::DecodingMode;
use qa_bench_core::config::BenchConfig;
use qa_bench_core::contract::ResponseContract;
pub use qa_bench_core::report::OutputFormat;
use parse::{parse_contract, parse_format, parse_mode};

/// qa-bench - structured-output question answering benchmark
#[derive(Parser, Debug)]
#[command(name = "qa-bench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ./qa-bench.toml when present)
    #[arg(long, global = true, env = "QA_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level or filter directive (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark grid (modes x response contracts)
    Run(RunArgs),

    /// Import a CSV file (metadata, problem, answer) into a dataset
    Import {
        /// CSV file with a header row
        #[arg(long)]
        csv: PathBuf,

        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Summarize a dataset
    Summarize {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// List recorded experiments
    Experiments {
        /// Directory holding experiment results
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },
}

/// Dataset location overrides
#[derive(Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    /// Dataset project
    #[arg(long)]
    pub project: Option<String>,

    /// Dataset name
    #[arg(long)]
    pub name: Option<String>,

    /// Directory holding datasets
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,
}

impl DatasetArgs {
    pub fn apply(&self, config: &mut BenchConfig) {
        if let Some(project) = &self.project {
            config.dataset.project = project.clone();
        }
        if let Some(name) = &self.name {
            config.dataset.name = name.clone();
        }
        if let Some(root) = &self.dataset_root {
            config.dataset.root = root.clone();
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Decoding modes, comma separated (json, tools, json_schema)
    #[arg(long, value_delimiter = ',', value_parser = parse_mode)]
    pub modes: Vec<DecodingMode>,

    /// Response contracts, comma separated (plain, with_rationale)
    #[arg(long, value_delimiter = ',', value_parser = parse_contract)]
    pub contracts: Vec<ResponseContract>,

    /// Model under test
    #[arg(long)]
    pub model: Option<String>,

    /// Model used by the grader
    #[arg(long)]
    pub judge_model: Option<String>,

    /// Decoding mode of the grader
    #[arg(long, value_parser = parse_mode)]
    pub judge_mode: Option<DecodingMode>,

    /// Item pipelines in flight at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Evaluate only the first N dataset items
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Judge instruction template
    #[arg(long)]
    pub grader_prompt: Option<PathBuf>,

    /// OpenAI-compatible API base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Directory for experiment records
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Use a scripted offline client instead of the API
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub dataset: DatasetArgs,
}

impl RunArgs {
    pub fn apply(&self, config: &mut BenchConfig) {
        if !self.modes.is_empty() {
            config.modes = self.modes.clone();
        }
        if !self.contracts.is_empty() {
            config.contracts = self.contracts.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(judge_model) = &self.judge_model {
            config.judge_model = judge_model.clone();
        }
        if let Some(judge_mode) = self.judge_mode {
            config.judge_mode = judge_mode;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if let Some(max_items) = self.max_items {
            config.max_items = max_items;
        }
        if let Some(grader_prompt) = &self.grader_prompt {
            config.grader_prompt = grader_prompt.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(results_dir) = &self.results_dir {
            config.results_dir = results_dir.clone();
        }
        self.dataset.apply(config);
    }
}
