//! Run orchestration
//!
//! An [`EvalSpec`] names a run, its data, the task producing an output per
//! item and the scorers judging each output. An [`EvalSink`] executes the
//! spec and returns per-item records plus an [`ExperimentSummary`].
//!
//! [`Evaluator`] is the local sink: item pipelines (task, then every scorer)
//! run concurrently on the tokio runtime, admitted through a semaphore so at
//! most `max_concurrency` pipelines are in flight. A failing item is recorded
//! as errored and excluded from the score means; the run carries on.

pub mod records;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::dataset::DatasetItem;
use crate::error::{BenchError, Result};
use crate::{bail_invalid, trace_time};

pub use records::{ExperimentLog, ExperimentSummary, ItemRecord, Score};

/// Observability side channel handed to a [`Task`].
///
/// Values recorded here end up in the item record, never in the task output.
#[derive(Debug, Clone, Default)]
pub struct TaskHooks {
    meta: Map<String, Value>,
}

impl TaskHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a side-channel value
    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn recorded(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn into_meta(self) -> Map<String, Value> {
        self.meta
    }
}

/// Produces an output for one item.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, input: &str, hooks: &mut TaskHooks) -> Result<String>;
}

/// What a [`Scorer`] sees of an item.
#[derive(Debug, Clone, Copy)]
pub struct ScorerArgs<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub expected: Option<&'a str>,
    pub metadata: &'a Map<String, Value>,
}

/// Judges one task output.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, args: ScorerArgs<'_>) -> Result<Score>;
}

/// A named run over a dataset.
pub struct EvalSpec {
    pub name: String,
    pub data: Vec<DatasetItem>,
    pub task: Arc<dyn Task>,
    pub scorers: Vec<Arc<dyn Scorer>>,
    pub max_concurrency: usize,
    /// Copied verbatim into the summary
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct EvalResult {
    pub summary: ExperimentSummary,
    pub records: Vec<ItemRecord>,
}

/// Executes an [`EvalSpec`] end to end.
#[async_trait]
pub trait EvalSink: Send + Sync {
    async fn run(&self, spec: EvalSpec) -> Result<EvalResult>;
}

/// Runs experiments in-process, optionally persisting them.
#[derive(Default)]
pub struct Evaluator {
    log: Option<ExperimentLog>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: ExperimentLog) -> Self {
        self.log = Some(log);
        self
    }
}

#[async_trait]
impl EvalSink for Evaluator {
    async fn run(&self, spec: EvalSpec) -> Result<EvalResult> {
        if spec.max_concurrency == 0 {
            bail_invalid!("max_concurrency", "0 (must be at least 1)");
        }

        let experiment_name = format!(
            "{}-{}",
            spec.name,
            ulid::Ulid::new().to_string().to_lowercase()
        );
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            experiment = %experiment_name,
            items = spec.data.len(),
            max_concurrency = spec.max_concurrency,
            "experiment_started"
        );

        let records = dispatch(&spec).await?;
        let summary = summarize(&spec, experiment_name, started_at, &records);

        tracing::info!(
            experiment = %summary.experiment_name,
            scored = summary.scored,
            errored = summary.errored,
            "experiment_finished"
        );
        trace_time!(start, "experiment_run", experiment = summary.experiment_name.as_str());

        if let Some(log) = &self.log {
            log.append(&summary, &records)?;
        }

        Ok(EvalResult { summary, records })
    }
}

async fn dispatch(spec: &EvalSpec) -> Result<Vec<ItemRecord>> {
    let semaphore = Arc::new(Semaphore::new(spec.max_concurrency));
    let scorers: Arc<[Arc<dyn Scorer>]> = spec.scorers.clone().into();
    let mut pipelines = JoinSet::new();

    for (index, item) in spec.data.iter().cloned().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BenchError::Other(format!("concurrency gate closed: {}", e)))?;
        let task = Arc::clone(&spec.task);
        let scorers = Arc::clone(&scorers);
        pipelines.spawn(async move {
            let record = run_item(index, item, task, scorers).await;
            drop(permit);
            record
        });
    }

    let mut records = Vec::with_capacity(spec.data.len());
    while let Some(joined) = pipelines.join_next().await {
        let record = joined
            .map_err(|e| BenchError::Other(format!("item pipeline aborted: {}", e)))?;
        records.push(record);
    }
    records.sort_by_key(|r| r.index);
    Ok(records)
}

async fn run_item(
    index: usize,
    item: DatasetItem,
    task: Arc<dyn Task>,
    scorers: Arc<[Arc<dyn Scorer>]>,
) -> ItemRecord {
    let start = Instant::now();
    let mut hooks = TaskHooks::new();
    let mut record = ItemRecord {
        index,
        id: item.id.clone(),
        input: item.input.clone(),
        expected: item.expected.clone(),
        output: None,
        task_meta: Map::new(),
        scores: Vec::new(),
        error: None,
        duration_secs: 0.0,
    };

    match task.run(&item.input, &mut hooks).await {
        Ok(output) => {
            for scorer in scorers.iter() {
                let args = ScorerArgs {
                    input: &item.input,
                    output: &output,
                    expected: item.expected.as_deref(),
                    metadata: &item.metadata,
                };
                match scorer.score(args).await {
                    Ok(score) => record.scores.push(score),
                    Err(e) => {
                        tracing::warn!(index, scorer = scorer.name(), error = %e, "scorer_failed");
                        record.error = Some(format!("{}: {}", scorer.name(), e));
                        break;
                    }
                }
            }
            record.output = Some(output);
        }
        Err(e) => {
            tracing::warn!(index, error = %e, "task_failed");
            record.error = Some(e.to_string());
        }
    }

    record.task_meta = hooks.into_meta();
    record.duration_secs = start.elapsed().as_secs_f64();
    record
}

fn summarize(
    spec: &EvalSpec,
    experiment_name: String,
    started_at: chrono::DateTime<Utc>,
    records: &[ItemRecord],
) -> ExperimentSummary {
    let scored: Vec<&ItemRecord> = records.iter().filter(|r| !r.is_errored()).collect();

    let mut scores = std::collections::BTreeMap::new();
    if !scored.is_empty() {
        for scorer in &spec.scorers {
            let name = scorer.name();
            let hits = scored
                .iter()
                .filter(|r| r.scores.iter().any(|s| s.name == name && s.score))
                .count();
            scores.insert(name.to_string(), hits as f64 / scored.len() as f64);
        }
    }

    ExperimentSummary {
        experiment_name,
        eval_name: spec.name.clone(),
        started_at,
        finished_at: Utc::now(),
        metadata: spec.metadata.clone(),
        scores,
        total: records.len(),
        scored: scored.len(),
        errored: records.len() - scored.len(),
    }
}
