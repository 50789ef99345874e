//! Run reporting
//!
//! Pure presentation of grid results: a table for humans or a JSON array
//! for machines. Rows keep the order they were given in.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{BenchError, Result};
use crate::eval::ExperimentSummary;
use crate::grid::RunSummary;

/// Output format for qa-bench commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output for machine consumption
    Json,
}

impl FromStr for OutputFormat {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(BenchError::unsupported("format", other, "human, json")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render run summaries in grid order.
pub fn report(summaries: &[RunSummary], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(render_table(summaries)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summaries)?),
    }
}

fn format_accuracy(accuracy: Option<f64>) -> String {
    match accuracy {
        Some(value) => format!("{:.1}%", value * 100.0),
        None => "-".to_string(),
    }
}

fn render_table(summaries: &[RunSummary]) -> String {
    let mut out = String::new();
    if summaries.is_empty() {
        out.push_str("No runs completed.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<12} {:<22} {:<12} {:>9} {:>7} {:>8}  {}",
        "Mode", "Response model", "Model", "Accuracy", "Scored", "Errored", "Experiment"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<12} {:<22} {:<12} {:>9} {:>7} {:>8}  {}",
            s.mode.as_str(),
            s.response_model,
            s.model,
            format_accuracy(s.accuracy),
            s.scored,
            s.errored,
            s.experiment_id
        );
    }
    out
}

/// Render stored experiment summaries, oldest first.
pub fn report_experiments(summaries: &[ExperimentSummary], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = summaries
                .iter()
                .map(|s| {
                    json!({
                        "experiment_name": s.experiment_name,
                        "eval_name": s.eval_name,
                        "started_at": s.started_at.to_rfc3339(),
                        "metadata": s.metadata,
                        "scores": s.scores,
                        "total": s.total,
                        "scored": s.scored,
                        "errored": s.errored,
                    })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        OutputFormat::Human => {
            let mut out = String::new();
            if summaries.is_empty() {
                out.push_str("No experiments recorded.\n");
                return Ok(out);
            }
            for s in summaries {
                let scores = s
                    .scores
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, format_accuracy(Some(*value))))
                    .collect::<Vec<_>>()
                    .join(" ");
                let cell = ["mode", "response_model"]
                    .iter()
                    .filter_map(|key| s.metadata.get(*key).and_then(|v| v.as_str()))
                    .collect::<Vec<_>>()
                    .join("/");
                let _ = writeln!(
                    out,
                    "{}  {}  {}  {}/{} scored  {}",
                    s.started_at.format("%Y-%m-%d %H:%M:%S"),
                    s.experiment_name,
                    if cell.is_empty() { "-" } else { cell.as_str() },
                    s.scored,
                    s.total,
                    if scores.is_empty() { "-".to_string() } else { scores },
                );
            }
            Ok(out)
        }
    }
}
