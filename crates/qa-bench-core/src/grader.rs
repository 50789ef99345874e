//! Verdict grading
//!
//! An LLM judge compares a predicted answer with the gold answer and picks a
//! letter: `A` (correct), `B` (incorrect) or `C` (not attempted). The letter
//! becomes a [`Verdict`] and then an `accuracy` [`Score`] that is true only
//! for a correct verdict.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{complete_structured, Message, ModelClient};
use crate::contract::{GradedChoice, Verdict};
use crate::error::{BenchError, Result};
use crate::eval::{Score, Scorer, ScorerArgs};
use crate::prompt::PromptTemplate;

pub const SCORE_NAME: &str = "accuracy";

const JUDGE_PROMPT: &str = r#"
    {{ grader_prompt_prefix }}
    Here is a new example. Simply reply with either CORRECT, INCORRECT, NOT ATTEMPTED. Don't
        apologize or correct yourself if there was a mistake; we are just trying to grade the
        answer.
    ```
    Question: {{ question }}
    Gold target: {{ target }}
    Predicted answer: {{ predicted_answer }}
    ```

    Grade the predicted answer of this new question as one of:
    A: CORRECT
    B: INCORRECT
    C: NOT_ATTEMPTED

    Just return the letters "A", "B", or "C", as a JSON object with a key "choice".
    "#;

/// Read the judge instruction prefix from disk.
pub fn load_grader_prompt(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(BenchError::not_found(
            "grader prompt",
            path.display().to_string(),
        ));
    }
    Ok(fs::read_to_string(path)?)
}

/// Scores answers with an LLM judge.
///
/// The judge instruction prefix is supplied at construction and shared
/// read-only by every grading call.
#[derive(Clone)]
pub struct VerdictGrader {
    client: Arc<dyn ModelClient>,
    model: String,
    prompt_prefix: Arc<str>,
    template: PromptTemplate,
}

impl VerdictGrader {
    pub fn new(
        client: Arc<dyn ModelClient>,
        model: impl Into<String>,
        prompt_prefix: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompt_prefix: prompt_prefix.into(),
            template: PromptTemplate::new(JUDGE_PROMPT),
        }
    }

    /// Ask the judge for a verdict on one answer.
    pub async fn judge(&self, question: &str, predicted: &str, gold: &str) -> Result<Verdict> {
        let prompt = self.template.render(&HashMap::from([
            ("grader_prompt_prefix", self.prompt_prefix.as_ref()),
            ("question", question),
            ("target", gold),
            ("predicted_answer", predicted),
        ]))?;

        let graded: GradedChoice = complete_structured(
            self.client.as_ref(),
            &self.model,
            vec![Message::system(prompt)],
        )
        .await?;

        Ok(Verdict::from(graded.choice))
    }

    /// Grade one answer into an `accuracy` score record.
    ///
    /// `gold` is required; without it grading fails before the judge is called.
    pub async fn grade(
        &self,
        question: &str,
        predicted: &str,
        gold: Option<&str>,
        metadata: &Map<String, Value>,
    ) -> Result<Score> {
        let gold = gold.ok_or_else(|| BenchError::missing_metadata("expected"))?;
        let verdict = self.judge(question, predicted, gold).await?;

        tracing::debug!(verdict = verdict.label(), "graded");

        let mut score_metadata = Map::new();
        score_metadata.insert("query".to_string(), Value::from(question));
        score_metadata.insert("result".to_string(), Value::from(predicted));
        score_metadata.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        score_metadata.insert("score".to_string(), Value::from(verdict.label()));

        Ok(Score {
            name: SCORE_NAME.to_string(),
            score: verdict.is_correct(),
            metadata: score_metadata,
        })
    }
}

#[async_trait]
impl Scorer for VerdictGrader {
    fn name(&self) -> &str {
        SCORE_NAME
    }

    async fn score(&self, args: ScorerArgs<'_>) -> Result<Score> {
        self.grade(args.input, args.output, args.expected, args.metadata)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{DecodingMode, MockClient, Role};
    use crate::contract::StructuredResponse;
    use serde_json::json;
    use tempfile::tempdir;

    const PREFIX: &str = "Your job is to grade a predicted answer against a gold target.";

    fn grader_choosing(letter: &str) -> (VerdictGrader, Arc<MockClient>) {
        let client = Arc::new(
            MockClient::new(DecodingMode::Json)
                .with_response(GradedChoice::SCHEMA_NAME, json!({ "choice": letter })),
        );
        (VerdictGrader::new(client.clone(), "gpt-4o", PREFIX), client)
    }

    fn topic() -> Map<String, Value> {
        json!({"topic": "geo"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_choice_a_scores_correct() {
        let (grader, _) = grader_choosing("A");
        let score = grader
            .grade("Capital of France?", "Paris", Some("Paris"), &topic())
            .await
            .unwrap();

        assert_eq!(score.name, "accuracy");
        assert!(score.score);
        assert_eq!(
            Value::Object(score.metadata),
            json!({
                "query": "Capital of France?",
                "result": "Paris",
                "topic": "geo",
                "score": "CORRECT"
            })
        );
    }

    #[tokio::test]
    async fn test_choice_b_scores_incorrect() {
        let (grader, _) = grader_choosing("B");
        let score = grader
            .grade("Capital of France?", "Lyon", Some("Paris"), &topic())
            .await
            .unwrap();
        assert!(!score.score);
        assert_eq!(score.metadata["score"], "INCORRECT");
        assert_eq!(score.metadata["result"], "Lyon");
    }

    #[tokio::test]
    async fn test_choice_c_scores_not_attempted() {
        let (grader, _) = grader_choosing("C");
        let score = grader
            .grade("Capital of France?", "I don't know", Some("Paris"), &Map::new())
            .await
            .unwrap();
        assert!(!score.score);
        assert_eq!(score.metadata["score"], "NOT_ATTEMPTED");
    }

    #[tokio::test]
    async fn test_only_correct_scores_true() {
        for (letter, expected) in [("A", true), ("B", false), ("C", false)] {
            let (grader, _) = grader_choosing(letter);
            let score = grader.grade("q", "p", Some("g"), &Map::new()).await.unwrap();
            assert_eq!(score.score, expected, "choice {letter}");
        }
    }

    #[tokio::test]
    async fn test_other_letter_is_contract_violation() {
        let (grader, _) = grader_choosing("D");
        let err = grader
            .grade("q", "p", Some("g"), &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::ContractViolation { .. }));
    }

    #[tokio::test]
    async fn test_missing_expected_fails_before_judge() {
        let (grader, client) = grader_choosing("A");
        let err = grader.grade("q", "p", None, &Map::new()).await.unwrap_err();

        match err {
            BenchError::MissingRequiredMetadata { key } => assert_eq!(key, "expected"),
            other => panic!("expected missing metadata, got {other:?}"),
        }
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_judge_prompt_is_one_system_message() {
        let (grader, client) = grader_choosing("A");
        grader
            .grade("Who wrote Dune?", "Herbert", Some("Frank Herbert"), &Map::new())
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests[0].schema.name, "GradedChoice");
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].role, Role::System);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.starts_with(PREFIX));
        assert!(prompt.contains("Question: Who wrote Dune?"));
        assert!(prompt.contains("Gold target: Frank Herbert"));
        assert!(prompt.contains("Predicted answer: Herbert"));
        assert!(prompt.contains("as a JSON object with a key \"choice\""));
    }

    #[tokio::test]
    async fn test_scorer_uses_item_fields() {
        let (grader, _) = grader_choosing("A");
        let metadata = topic();
        let score = grader
            .score(ScorerArgs {
                input: "q",
                output: "p",
                expected: Some("p"),
                metadata: &metadata,
            })
            .await
            .unwrap();
        assert_eq!(score.metadata["query"], "q");
        assert_eq!(score.metadata["topic"], "geo");
    }

    #[test]
    fn test_load_grader_prompt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grader_prompt.txt");
        fs::write(&path, PREFIX).unwrap();
        assert_eq!(load_grader_prompt(&path).unwrap(), PREFIX);

        let err = load_grader_prompt(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, BenchError::NotFound { .. }));
    }
}
