//! Configuration type definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::client::openai::DEFAULT_API_BASE;
use crate::client::DecodingMode;
use crate::contract::ResponseContract;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "qa-bench.toml";

/// Benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Model under test
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used by the verdict grader
    #[serde(default = "default_model")]
    pub judge_model: String,

    /// Decoding mode of the grader, independent of the mode under test
    #[serde(default = "default_judge_mode")]
    pub judge_mode: DecodingMode,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Item pipelines allowed in flight at once within one cell
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Dataset prefix to evaluate
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Decoding modes of the grid (outer loop)
    #[serde(default = "default_modes")]
    pub modes: Vec<DecodingMode>,

    /// Response contracts of the grid (inner loop)
    #[serde(default = "default_contracts")]
    pub contracts: Vec<ResponseContract>,

    /// Judge instruction template
    #[serde(default = "default_grader_prompt")]
    pub grader_prompt: PathBuf,

    /// Name shared by every experiment of a run
    #[serde(default = "default_eval_name")]
    pub eval_name: String,

    /// Where experiment records and summaries are written
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// Location of the evaluated dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_root")]
    pub root: PathBuf,

    #[serde(default = "default_dataset_project")]
    pub project: String,

    #[serde(default = "default_dataset_name")]
    pub name: String,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_judge_mode() -> DecodingMode {
    DecodingMode::Json
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_max_concurrency() -> usize {
    20
}

fn default_max_items() -> usize {
    400
}

fn default_modes() -> Vec<DecodingMode> {
    vec![DecodingMode::Json, DecodingMode::Tools]
}

fn default_contracts() -> Vec<ResponseContract> {
    ResponseContract::ALL.to_vec()
}

fn default_grader_prompt() -> PathBuf {
    PathBuf::from("prompts/grader_prompt.txt")
}

fn default_eval_name() -> String {
    "simple-qa".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(".qa-bench")
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_dataset_root() -> PathBuf {
    PathBuf::from("datasets")
}

fn default_dataset_project() -> String {
    "SimpleQA".to_string()
}

fn default_dataset_name() -> String {
    "SimpleQA".to_string()
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            root: default_dataset_root(),
            project: default_dataset_project(),
            name: default_dataset_name(),
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            model: default_model(),
            judge_model: default_model(),
            judge_mode: default_judge_mode(),
            api_base: default_api_base(),
            max_concurrency: default_max_concurrency(),
            max_items: default_max_items(),
            modes: default_modes(),
            contracts: default_contracts(),
            grader_prompt: default_grader_prompt(),
            eval_name: default_eval_name(),
            results_dir: default_results_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            dataset: DatasetConfig::default(),
        }
    }
}
