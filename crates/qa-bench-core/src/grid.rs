//! Configuration grid runner
//!
//! Runs the dataset once per (decoding mode, response contract) cell. Modes
//! form the outer loop and contracts the inner one, so summaries always come
//! back in that order. Each mode gets a fresh generator client; every cell
//! shares one grader whose decoding mode is fixed.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{DecodingMode, ModelClient};
use crate::contract::ResponseContract;
use crate::dataset::DatasetItem;
use crate::error::Result;
use crate::eval::{EvalSink, EvalSpec, ExperimentSummary, Scorer};
use crate::generator::AnswerGenerator;
use crate::grader::{VerdictGrader, SCORE_NAME};
use crate::{bail_invalid, bail_usage, trace_time};

/// Builds the generator client for a decoding mode.
pub trait ClientFactory: Send + Sync {
    fn client(&self, mode: DecodingMode) -> Result<Arc<dyn ModelClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(DecodingMode) -> Result<Arc<dyn ModelClient>> + Send + Sync,
{
    fn client(&self, mode: DecodingMode) -> Result<Arc<dyn ModelClient>> {
        self(mode)
    }
}

/// Outcome of one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub experiment_id: String,
    pub mode: DecodingMode,
    pub model: String,
    pub response_contract: ResponseContract,
    /// Schema name requested from the model
    pub response_model: String,
    /// Fraction of scored items graded correct
    pub accuracy: Option<f64>,
    pub scored: usize,
    pub errored: usize,
    pub total: usize,
}

impl RunSummary {
    fn from_experiment(
        summary: &ExperimentSummary,
        mode: DecodingMode,
        model: &str,
        contract: ResponseContract,
    ) -> Self {
        Self {
            experiment_id: summary.experiment_name.clone(),
            mode,
            model: model.to_string(),
            response_contract: contract,
            response_model: contract.schema_name().to_string(),
            accuracy: summary.score(SCORE_NAME),
            scored: summary.scored,
            errored: summary.errored,
            total: summary.total,
        }
    }
}

pub struct GridRunner {
    eval_name: String,
    model: String,
    factory: Arc<dyn ClientFactory>,
    grader: Arc<VerdictGrader>,
    sink: Arc<dyn EvalSink>,
}

impl GridRunner {
    pub fn new(
        eval_name: impl Into<String>,
        model: impl Into<String>,
        factory: Arc<dyn ClientFactory>,
        grader: Arc<VerdictGrader>,
        sink: Arc<dyn EvalSink>,
    ) -> Self {
        Self {
            eval_name: eval_name.into(),
            model: model.into(),
            factory,
            grader,
            sink,
        }
    }

    /// Evaluate `data` under every (mode, contract) pair.
    ///
    /// A cell that fails as a whole is logged and left out of the result;
    /// the remaining cells still run.
    pub async fn run_grid(
        &self,
        data: &[DatasetItem],
        modes: &[DecodingMode],
        contracts: &[ResponseContract],
        max_concurrency: usize,
    ) -> Result<Vec<RunSummary>> {
        if max_concurrency == 0 {
            bail_invalid!("max_concurrency", "0 (must be at least 1)");
        }
        if modes.is_empty() || contracts.is_empty() {
            bail_usage!("the configuration grid is empty: at least one mode and one contract are required");
        }

        let start = Instant::now();
        let mut summaries = Vec::with_capacity(modes.len() * contracts.len());

        for &mode in modes {
            let client = match self.factory.client(mode) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(mode = %mode, error = %e, "client_unavailable_skipping_mode");
                    continue;
                }
            };
            let generator = AnswerGenerator::new(client, self.model.clone());

            for &contract in contracts {
                tracing::info!(mode = %mode, contract = %contract, items = data.len(), "cell_started");

                let spec = EvalSpec {
                    name: self.eval_name.clone(),
                    data: data.to_vec(),
                    task: Arc::new(generator.task(contract)),
                    scorers: vec![self.grader.clone() as Arc<dyn Scorer>],
                    max_concurrency,
                    metadata: self.cell_metadata(mode, contract),
                };

                match self.sink.run(spec).await {
                    Ok(result) => {
                        let summary = RunSummary::from_experiment(
                            &result.summary,
                            mode,
                            &self.model,
                            contract,
                        );
                        tracing::info!(
                            mode = %mode,
                            contract = %contract,
                            experiment = %summary.experiment_id,
                            accuracy = ?summary.accuracy,
                            "cell_finished"
                        );
                        summaries.push(summary);
                    }
                    Err(e) => {
                        tracing::warn!(mode = %mode, contract = %contract, error = %e, "cell_failed");
                    }
                }
            }
        }

        trace_time!(start, "run_grid", cells = summaries.len());
        Ok(summaries)
    }

    fn cell_metadata(&self, mode: DecodingMode, contract: ResponseContract) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("mode".to_string(), Value::from(mode.as_str()));
        metadata.insert(
            "response_model".to_string(),
            Value::from(contract.schema_name()),
        );
        metadata.insert("response_contract".to_string(), Value::from(contract.as_str()));
        metadata.insert("model".to_string(), Value::from(self.model.as_str()));
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;
    use crate::contract::{GeneratedResponse, GeneratedResponseCot, GradedChoice, StructuredResponse};
    use crate::error::BenchError;
    use crate::eval::{EvalResult, Evaluator};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the metadata of every spec, then delegates to a real evaluator.
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<Map<String, Value>>>,
        fail_cell: Option<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl EvalSink for RecordingSink {
        async fn run(&self, spec: EvalSpec) -> Result<EvalResult> {
            self.seen.lock().unwrap().push(spec.metadata.clone());
            if let Some((mode, contract)) = self.fail_cell {
                if spec.metadata["mode"] == mode && spec.metadata["response_contract"] == contract {
                    return Err(BenchError::Other("sink unavailable".to_string()));
                }
            }
            Evaluator::new().run(spec).await
        }
    }

    fn answering_client(mode: DecodingMode) -> Arc<dyn ModelClient> {
        Arc::new(
            MockClient::new(mode)
                .with_response(
                    GeneratedResponse::SCHEMA_NAME,
                    json!({"answer": "Paris", "confidence_score": 90}),
                )
                .with_response(
                    GeneratedResponseCot::SCHEMA_NAME,
                    json!({"chain_of_thought": "...", "answer": "Paris", "confidence_score": 80}),
                ),
        )
    }

    fn grader(letter: &str) -> (Arc<VerdictGrader>, Arc<MockClient>) {
        let judge = Arc::new(
            MockClient::new(DecodingMode::Json)
                .with_response(GradedChoice::SCHEMA_NAME, json!({ "choice": letter })),
        );
        (
            Arc::new(VerdictGrader::new(judge.clone(), "gpt-4o", "Grade it.")),
            judge,
        )
    }

    fn dataset(n: usize) -> Vec<DatasetItem> {
        (0..n)
            .map(|i| DatasetItem::new(format!("question {i}"), "Paris").with_metadata("i", i))
            .collect()
    }

    fn runner(sink: Arc<RecordingSink>, grader: Arc<VerdictGrader>) -> GridRunner {
        GridRunner::new(
            "simple-qa",
            "gpt-4o",
            Arc::new(|mode: DecodingMode| -> Result<Arc<dyn ModelClient>> {
                Ok(answering_client(mode))
            }),
            grader,
            sink,
        )
    }

    #[tokio::test]
    async fn test_cells_enumerate_modes_outer_contracts_inner() {
        let sink = Arc::new(RecordingSink::default());
        let (grader, _) = grader("A");

        let summaries = runner(sink.clone(), grader)
            .run_grid(
                &dataset(2),
                &[DecodingMode::Json, DecodingMode::Tools],
                &ResponseContract::ALL,
                4,
            )
            .await
            .unwrap();

        let cells: Vec<_> = summaries
            .iter()
            .map(|s| (s.mode, s.response_contract))
            .collect();
        assert_eq!(
            cells,
            vec![
                (DecodingMode::Json, ResponseContract::Plain),
                (DecodingMode::Json, ResponseContract::WithRationale),
                (DecodingMode::Tools, ResponseContract::Plain),
                (DecodingMode::Tools, ResponseContract::WithRationale),
            ]
        );
        assert_eq!(summaries[1].response_model, "GeneratedResponseCOT");

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen[2]["mode"], "tools");
        assert_eq!(seen[2]["response_model"], "GeneratedResponse");
        assert_eq!(seen[2]["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn test_each_cell_scores_its_own_records() {
        let sink = Arc::new(RecordingSink::default());
        let (grader, judge) = grader("A");

        let summaries = runner(sink, grader)
            .run_grid(
                &dataset(10),
                &[DecodingMode::Json, DecodingMode::Tools],
                &ResponseContract::ALL,
                3,
            )
            .await
            .unwrap();

        assert_eq!(summaries.len(), 4);
        for summary in &summaries {
            assert_eq!(summary.total, 10);
            assert_eq!(summary.scored, 10);
            assert_eq!(summary.errored, 0);
            assert_eq!(summary.accuracy, Some(1.0));
            assert_eq!(summary.model, "gpt-4o");
        }
        let ids: std::collections::HashSet<_> =
            summaries.iter().map(|s| s.experiment_id.clone()).collect();
        assert_eq!(ids.len(), 4);
        // One shared judge, fixed mode, graded every item of every cell
        assert_eq!(judge.call_count(), 40);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_spans_generation_and_grading() {
        // One client answers both generation and grading, so its peak is the
        // combined number of model calls in flight.
        let client = Arc::new(
            MockClient::new(DecodingMode::Json)
                .with_latency(Duration::from_millis(20))
                .with_response(
                    GeneratedResponse::SCHEMA_NAME,
                    json!({"answer": "Paris", "confidence_score": 90}),
                )
                .with_response(GradedChoice::SCHEMA_NAME, json!({"choice": "A"})),
        );
        let grader = Arc::new(VerdictGrader::new(client.clone(), "gpt-4o", "Grade it."));
        let generator_client: Arc<dyn ModelClient> = client.clone();
        let runner = GridRunner::new(
            "simple-qa",
            "gpt-4o",
            Arc::new(move |_mode: DecodingMode| -> Result<Arc<dyn ModelClient>> {
                Ok(generator_client.clone())
            }),
            grader,
            Arc::new(Evaluator::new()),
        );
        let data: Vec<_> = (0..12)
            .map(|i| DatasetItem::new(format!("q{i}?"), "Paris"))
            .collect();

        let summaries = runner
            .run_grid(&data, &[DecodingMode::Json], &[ResponseContract::Plain], 3)
            .await
            .unwrap();
        assert_eq!(summaries[0].accuracy, Some(1.0));

        let peak = client.max_in_flight();
        assert!(peak <= 3, "peak {peak} exceeds the limit");
        assert!(peak >= 2, "items never overlapped");

        let requests = client.requests();
        assert_eq!(requests.len(), 24);
        for i in 0..12 {
            let generation = requests
                .iter()
                .position(|r| {
                    r.schema.name == GeneratedResponse::SCHEMA_NAME
                        && r.messages[0].content.contains(&format!("\nq{i}?\n"))
                })
                .unwrap();
            let grading = requests
                .iter()
                .position(|r| {
                    r.schema.name == GradedChoice::SCHEMA_NAME
                        && r.messages[0].content.contains(&format!("Question: q{i}?\n"))
                })
                .unwrap();
            assert!(generation < grading, "item {i} graded before it was answered");
        }
    }

    #[tokio::test]
    async fn test_not_attempted_grid_has_zero_accuracy() {
        let sink = Arc::new(RecordingSink::default());
        let (grader, _) = grader("C");

        let summaries = runner(sink, grader)
            .run_grid(&dataset(3), &[DecodingMode::Json], &[ResponseContract::Plain], 2)
            .await
            .unwrap();
        assert_eq!(summaries[0].accuracy, Some(0.0));
    }

    #[tokio::test]
    async fn test_failed_cell_is_skipped() {
        let sink = Arc::new(RecordingSink {
            fail_cell: Some(("json", "with_rationale")),
            ..Default::default()
        });
        let (grader, _) = grader("A");

        let summaries = runner(sink.clone(), grader)
            .run_grid(
                &dataset(2),
                &[DecodingMode::Json, DecodingMode::Tools],
                &ResponseContract::ALL,
                2,
            )
            .await
            .unwrap();

        assert_eq!(sink.seen.lock().unwrap().len(), 4);
        let cells: Vec<_> = summaries
            .iter()
            .map(|s| (s.mode, s.response_contract))
            .collect();
        assert_eq!(
            cells,
            vec![
                (DecodingMode::Json, ResponseContract::Plain),
                (DecodingMode::Tools, ResponseContract::Plain),
                (DecodingMode::Tools, ResponseContract::WithRationale),
            ]
        );
    }

    #[tokio::test]
    async fn test_item_failures_do_not_leak_across_cells() {
        // Tools-mode client cannot produce the plain contract
        let factory = |mode: DecodingMode| -> Result<Arc<dyn ModelClient>> {
            if mode == DecodingMode::Tools {
                Ok(Arc::new(MockClient::new(mode).with_response(
                    GeneratedResponseCot::SCHEMA_NAME,
                    json!({"chain_of_thought": "", "answer": "Paris", "confidence_score": 50}),
                )))
            } else {
                Ok(answering_client(mode))
            }
        };
        let (grader, _) = grader("A");
        let runner = GridRunner::new(
            "simple-qa",
            "gpt-4o",
            Arc::new(factory),
            grader,
            Arc::new(RecordingSink::default()),
        );

        let summaries = runner
            .run_grid(
                &dataset(5),
                &[DecodingMode::Json, DecodingMode::Tools],
                &ResponseContract::ALL,
                5,
            )
            .await
            .unwrap();

        assert_eq!(summaries.len(), 4);
        assert_eq!(summaries[0].errored, 0);
        assert_eq!(summaries[2].errored, 5);
        assert_eq!(summaries[2].accuracy, None);
        assert_eq!(summaries[3].errored, 0);
        assert_eq!(summaries[3].accuracy, Some(1.0));
    }

    #[tokio::test]
    async fn test_mode_without_client_is_skipped() {
        let factory = |mode: DecodingMode| -> Result<Arc<dyn ModelClient>> {
            if mode == DecodingMode::JsonSchema {
                Err(BenchError::MissingApiKey)
            } else {
                Ok(answering_client(mode))
            }
        };
        let (grader, _) = grader("B");
        let runner = GridRunner::new(
            "simple-qa",
            "gpt-4o",
            Arc::new(factory),
            grader,
            Arc::new(RecordingSink::default()),
        );

        let summaries = runner
            .run_grid(
                &dataset(1),
                &[DecodingMode::JsonSchema, DecodingMode::Json],
                &[ResponseContract::Plain],
                1,
            )
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].mode, DecodingMode::Json);
        assert_eq!(summaries[0].accuracy, Some(0.0));
    }

    #[tokio::test]
    async fn test_empty_grid_is_rejected() {
        let (grader, _) = grader("A");
        let err = runner(Arc::new(RecordingSink::default()), grader)
            .run_grid(&dataset(1), &[], &ResponseContract::ALL, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::UsageError(_)));
    }
}
