//! Structured response contracts
//!
//! Typed shapes the model must produce: a generated answer (plain, or with a
//! reasoning trace) and the judge's graded choice. Each shape carries the JSON
//! schema sent to the model and is validated on the way back in; a response
//! that does not deserialize is a [`BenchError::ContractViolation`].

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{BenchError, Result};

/// Schema handed to a model client alongside the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Identifier used as the tool/function name and in error messages
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the expected object
    pub schema: Value,
}

/// A type the model can be asked to produce.
pub trait StructuredResponse: DeserializeOwned + Serialize + Send + 'static {
    const SCHEMA_NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn json_schema() -> Value;

    fn response_schema() -> ResponseSchema {
        ResponseSchema {
            name: Self::SCHEMA_NAME,
            description: Self::DESCRIPTION,
            schema: Self::json_schema(),
        }
    }
}

/// Deserialize a raw model object into `T`, mapping failures to contract violations.
pub fn parse_structured<T: StructuredResponse>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| BenchError::contract_violation(T::SCHEMA_NAME, e))
}

/// Confidence in an answer, a percentage in the closed interval [0, 100].
///
/// Out-of-range values are rejected at deserialization, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConfidenceScore(f64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceOutOfRange(pub f64);

impl fmt::Display for ConfidenceOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "confidence_score must be between 0 and 100, got {}",
            self.0
        )
    }
}

impl ConfidenceScore {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    pub fn new(value: f64) -> std::result::Result<Self, ConfidenceOutOfRange> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfidenceOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ConfidenceScore {
    type Error = ConfidenceOutOfRange;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfidenceScore> for f64 {
    fn from(score: ConfidenceScore) -> f64 {
        score.0
    }
}

fn confidence_schema() -> Value {
    json!({
        "type": "number",
        "minimum": ConfidenceScore::MIN,
        "maximum": ConfidenceScore::MAX,
        "description": "Confidence that the answer is correct, from 0 to 100"
    })
}

/// Answer without an explicit reasoning trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub answer: String,
    pub confidence_score: ConfidenceScore,
}

impl StructuredResponse for GeneratedResponse {
    const SCHEMA_NAME: &'static str = "GeneratedResponse";
    const DESCRIPTION: &'static str = "An answer to the question with a confidence score";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string" },
                "confidence_score": confidence_schema(),
            },
            "required": ["answer", "confidence_score"],
            "additionalProperties": false
        })
    }
}

/// Answer preceded by the model's chain of thought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponseCot {
    pub chain_of_thought: String,
    pub answer: String,
    pub confidence_score: ConfidenceScore,
}

impl StructuredResponse for GeneratedResponseCot {
    const SCHEMA_NAME: &'static str = "GeneratedResponseCOT";
    const DESCRIPTION: &'static str =
        "Step-by-step reasoning, then an answer to the question with a confidence score";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "chain_of_thought": { "type": "string" },
                "answer": { "type": "string" },
                "confidence_score": confidence_schema(),
            },
            "required": ["chain_of_thought", "answer", "confidence_score"],
            "additionalProperties": false
        })
    }
}

/// Which answer shape a grid cell asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseContract {
    Plain,
    WithRationale,
}

impl ResponseContract {
    pub const ALL: [ResponseContract; 2] =
        [ResponseContract::Plain, ResponseContract::WithRationale];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseContract::Plain => "plain",
            ResponseContract::WithRationale => "with_rationale",
        }
    }

    /// Name of the schema this variant requests
    pub fn schema_name(&self) -> &'static str {
        match self {
            ResponseContract::Plain => GeneratedResponse::SCHEMA_NAME,
            ResponseContract::WithRationale => GeneratedResponseCot::SCHEMA_NAME,
        }
    }
}

impl fmt::Display for ResponseContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseContract {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(ResponseContract::Plain),
            "with_rationale" | "with-rationale" | "cot" => Ok(ResponseContract::WithRationale),
            other => Err(BenchError::unsupported(
                "response contract",
                other,
                "plain, with_rationale",
            )),
        }
    }
}

/// A validated answer of either contract variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedAnswer {
    Plain(GeneratedResponse),
    WithRationale(GeneratedResponseCot),
}

impl GeneratedAnswer {
    pub fn answer(&self) -> &str {
        match self {
            GeneratedAnswer::Plain(r) => &r.answer,
            GeneratedAnswer::WithRationale(r) => &r.answer,
        }
    }

    pub fn confidence_score(&self) -> ConfidenceScore {
        match self {
            GeneratedAnswer::Plain(r) => r.confidence_score,
            GeneratedAnswer::WithRationale(r) => r.confidence_score,
        }
    }

    pub fn into_answer(self) -> String {
        match self {
            GeneratedAnswer::Plain(r) => r.answer,
            GeneratedAnswer::WithRationale(r) => r.answer,
        }
    }
}

/// The judge's letter choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::A, Choice::B, Choice::C];

    pub fn letter(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
        }
    }
}

/// Judge output: exactly one of the three letters under the `choice` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedChoice {
    pub choice: Choice,
}

impl StructuredResponse for GradedChoice {
    const SCHEMA_NAME: &'static str = "GradedChoice";
    const DESCRIPTION: &'static str = "The grade assigned to the predicted answer";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "choice": {
                    "type": "string",
                    "enum": Choice::ALL.iter().map(Choice::letter).collect::<Vec<_>>(),
                }
            },
            "required": ["choice"],
            "additionalProperties": false
        })
    }
}

/// Categorical grade of a predicted answer against the gold answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Correct,
    Incorrect,
    NotAttempted,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Correct => "CORRECT",
            Verdict::Incorrect => "INCORRECT",
            Verdict::NotAttempted => "NOT_ATTEMPTED",
        }
    }

    /// No partial credit: only a correct verdict scores.
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

impl From<Choice> for Verdict {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::A => Verdict::Correct,
            Choice::B => Verdict::Incorrect,
            Choice::C => Verdict::NotAttempted,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_score_bounds_inclusive() {
        assert!(ConfidenceScore::new(0.0).is_ok());
        assert!(ConfidenceScore::new(100.0).is_ok());
        assert!(ConfidenceScore::new(-0.5).is_err());
        assert!(ConfidenceScore::new(100.01).is_err());
        assert!(ConfidenceScore::new(f64::NAN).is_err());
    }

    #[test]
    fn test_generated_response_rejects_out_of_range_confidence() {
        let value = json!({"answer": "4", "confidence_score": 150});
        let err = parse_structured::<GeneratedResponse>(value).unwrap_err();
        assert!(matches!(err, BenchError::ContractViolation { .. }));
        assert!(err.to_string().contains("between 0 and 100"));
    }

    #[test]
    fn test_generated_response_missing_confidence() {
        let value = json!({"answer": "4"});
        let err = parse_structured::<GeneratedResponse>(value).unwrap_err();
        match err {
            BenchError::ContractViolation { schema, reason } => {
                assert_eq!(schema, "GeneratedResponse");
                assert!(reason.contains("confidence_score"));
            }
            other => panic!("expected contract violation, got {other:?}"),
        }
    }

    #[test]
    fn test_cot_response_requires_chain_of_thought() {
        let value = json!({"answer": "Paris", "confidence_score": 90});
        assert!(parse_structured::<GeneratedResponseCot>(value).is_err());

        let value = json!({
            "chain_of_thought": "The capital of France is Paris.",
            "answer": "Paris",
            "confidence_score": 90.5
        });
        let parsed = parse_structured::<GeneratedResponseCot>(value).unwrap();
        assert_eq!(parsed.answer, "Paris");
        assert_eq!(parsed.confidence_score.value(), 90.5);
    }

    #[test]
    fn test_graded_choice_rejects_unknown_letter() {
        for bad in ["D", "a", "CORRECT", ""] {
            let err = parse_structured::<GradedChoice>(json!({ "choice": bad })).unwrap_err();
            assert!(matches!(err, BenchError::ContractViolation { .. }), "{bad}");
        }
    }

    #[test]
    fn test_choice_maps_to_verdict() {
        assert_eq!(Verdict::from(Choice::A), Verdict::Correct);
        assert_eq!(Verdict::from(Choice::B), Verdict::Incorrect);
        assert_eq!(Verdict::from(Choice::C), Verdict::NotAttempted);

        let correct: Vec<_> = Choice::ALL
            .iter()
            .map(|c| Verdict::from(*c).is_correct())
            .collect();
        assert_eq!(correct, vec![true, false, false]);
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(Verdict::NotAttempted.label(), "NOT_ATTEMPTED");
        assert_eq!(
            serde_json::to_value(Verdict::NotAttempted).unwrap(),
            json!("NOT_ATTEMPTED")
        );
    }

    #[test]
    fn test_schemas_require_every_property() {
        for schema in [
            GeneratedResponse::json_schema(),
            GeneratedResponseCot::json_schema(),
            GradedChoice::json_schema(),
        ] {
            let properties = schema["properties"].as_object().unwrap();
            let required = schema["required"].as_array().unwrap();
            assert_eq!(properties.len(), required.len());
        }
        assert_eq!(
            GradedChoice::json_schema()["properties"]["choice"]["enum"],
            json!(["A", "B", "C"])
        );
    }

    #[test]
    fn test_response_contract_from_str() {
        assert_eq!(
            "plain".parse::<ResponseContract>().unwrap(),
            ResponseContract::Plain
        );
        assert_eq!(
            "with-rationale".parse::<ResponseContract>().unwrap(),
            ResponseContract::WithRationale
        );
        assert!("verbose".parse::<ResponseContract>().is_err());
    }

    #[test]
    fn test_generated_answer_serializes_untagged() {
        let answer = GeneratedAnswer::Plain(GeneratedResponse {
            answer: "4".to_string(),
            confidence_score: ConfidenceScore::new(99.0).unwrap(),
        });
        assert_eq!(
            serde_json::to_value(&answer).unwrap(),
            json!({"answer": "4", "confidence_score": 99.0})
        );
    }
}
