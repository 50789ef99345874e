//! Experiment records and the on-disk experiment log.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BenchError, Result};

/// One scorer's judgement of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    pub score: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Everything recorded about one item of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Position in the evaluated data
    pub index: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Side-channel values recorded by the task
    #[serde(default)]
    pub task_meta: Map<String, Value>,
    #[serde(default)]
    pub scores: Vec<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_secs: f64,
}

impl ItemRecord {
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate outcome of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment_name: String,
    pub eval_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Mean of each scorer over the scored items
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    pub total: usize,
    pub scored: usize,
    pub errored: usize,
}

impl ExperimentSummary {
    pub fn score(&self, name: &str) -> Option<f64> {
        self.scores.get(name).copied()
    }
}

/// Append-only JSONL store of experiment results.
///
/// Layout under the results directory:
/// - `experiments/<experiment_name>.jsonl`: one [`ItemRecord`] per line
/// - `experiments/summaries.jsonl`: one [`ExperimentSummary`] per line
pub struct ExperimentLog {
    dir: PathBuf,
}

const SUMMARIES_FILE: &str = "summaries.jsonl";

impl ExperimentLog {
    pub fn new(results_dir: &Path) -> Self {
        Self {
            dir: results_dir.join("experiments"),
        }
    }

    pub fn summaries_path(&self) -> PathBuf {
        self.dir.join(SUMMARIES_FILE)
    }

    pub fn records_path(&self, experiment_name: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", experiment_name))
    }

    /// Persist one finished experiment.
    pub fn append(&self, summary: &ExperimentSummary, records: &[ItemRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut file = File::create(self.records_path(&summary.experiment_name))?;
        for record in records {
            writeln!(file, "{}", serde_json::to_string(record)?)?;
        }

        let mut summaries = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.summaries_path())?;
        writeln!(summaries, "{}", serde_json::to_string(summary)?)?;
        Ok(())
    }

    pub fn load_summaries(&self) -> Result<Vec<ExperimentSummary>> {
        read_jsonl(&self.summaries_path())
    }

    pub fn load_records(&self, experiment_name: &str) -> Result<Vec<ItemRecord>> {
        let path = self.records_path(experiment_name);
        if !path.exists() {
            return Err(BenchError::not_found("experiment", experiment_name));
        }
        read_jsonl(&path)
    }
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| BenchError::InvalidRecord {
            path: path.to_path_buf(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        out.push(value);
    }
    Ok(out)
}
