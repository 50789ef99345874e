//! Answer generation
//!
//! Asks the model under test for an answer in the shape of a
//! [`ResponseContract`] and reports the structured object through the task
//! hooks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{complete_structured, Message, ModelClient};
use crate::contract::{GeneratedAnswer, GeneratedResponse, GeneratedResponseCot, ResponseContract};
use crate::error::Result;
use crate::eval::{Task, TaskHooks};
use crate::prompt::PromptTemplate;

const GENERATION_PROMPT: &str = "
    Here is the question
    {{ question }}

    Please provide your best guess and a confidence score between 0% to 100% in the format requested.
    ";

#[derive(Clone)]
pub struct AnswerGenerator {
    client: Arc<dyn ModelClient>,
    model: String,
    template: PromptTemplate,
}

impl AnswerGenerator {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            template: PromptTemplate::new(GENERATION_PROMPT),
        }
    }

    /// Answer `question` in the shape of `contract`.
    ///
    /// On success `response_object` (pretty JSON) and `confidence_score` are
    /// recorded on `hooks`; on failure nothing is recorded.
    pub async fn generate(
        &self,
        question: &str,
        contract: ResponseContract,
        hooks: &mut TaskHooks,
    ) -> Result<String> {
        let prompt = self
            .template
            .render(&HashMap::from([("question", question)]))?;
        let messages = vec![Message::user(prompt)];

        let answer = match contract {
            ResponseContract::Plain => GeneratedAnswer::Plain(
                complete_structured::<GeneratedResponse>(self.client.as_ref(), &self.model, messages)
                    .await?,
            ),
            ResponseContract::WithRationale => GeneratedAnswer::WithRationale(
                complete_structured::<GeneratedResponseCot>(
                    self.client.as_ref(),
                    &self.model,
                    messages,
                )
                .await?,
            ),
        };

        hooks.meta("response_object", serde_json::to_string_pretty(&answer)?);
        hooks.meta("confidence_score", answer.confidence_score().value());

        Ok(answer.into_answer())
    }

    /// A [`Task`] answering every item with `contract`.
    pub fn task(&self, contract: ResponseContract) -> GenerationTask {
        GenerationTask {
            generator: self.clone(),
            contract,
        }
    }
}

/// An [`AnswerGenerator`] bound to one response contract.
pub struct GenerationTask {
    generator: AnswerGenerator,
    contract: ResponseContract,
}

#[async_trait]
impl Task for GenerationTask {
    async fn run(&self, input: &str, hooks: &mut TaskHooks) -> Result<String> {
        self.generator.generate(input, self.contract, hooks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{DecodingMode, MockClient, Role};
    use crate::contract::StructuredResponse;
    use crate::error::BenchError;
    use serde_json::json;

    fn generator(client: MockClient) -> (AnswerGenerator, Arc<MockClient>) {
        let client = Arc::new(client);
        (AnswerGenerator::new(client.clone(), "gpt-4o"), client)
    }

    #[tokio::test]
    async fn test_plain_answer_records_hooks() {
        let (generator, client) = generator(MockClient::new(DecodingMode::Json).with_response(
            GeneratedResponse::SCHEMA_NAME,
            json!({"answer": "Paris", "confidence_score": 95}),
        ));
        let mut hooks = TaskHooks::new();

        let answer = generator
            .generate("What is the capital of France?", ResponseContract::Plain, &mut hooks)
            .await
            .unwrap();

        assert_eq!(answer, "Paris");
        assert_eq!(hooks.recorded()["confidence_score"], json!(95.0));
        let object: serde_json::Value =
            serde_json::from_str(hooks.recorded()["response_object"].as_str().unwrap()).unwrap();
        assert_eq!(object, json!({"answer": "Paris", "confidence_score": 95.0}));
        assert!(hooks.recorded()["response_object"]
            .as_str()
            .unwrap()
            .contains('\n'));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].schema.name, "GeneratedResponse");
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].role, Role::User);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.starts_with("Here is the question\nWhat is the capital of France?"));
        assert!(prompt.contains("confidence score between 0% to 100%"));
    }

    #[tokio::test]
    async fn test_with_rationale_requests_cot_schema() {
        let (generator, client) = generator(MockClient::new(DecodingMode::Tools).with_response(
            GeneratedResponseCot::SCHEMA_NAME,
            json!({
                "chain_of_thought": "Sugeno won the 2010 award.",
                "answer": "Michio Sugeno",
                "confidence_score": 70.5
            }),
        ));
        let mut hooks = TaskHooks::default();

        let answer = generator
            .generate("Who won?", ResponseContract::WithRationale, &mut hooks)
            .await
            .unwrap();

        assert_eq!(answer, "Michio Sugeno");
        assert_eq!(client.requests()[0].schema.name, "GeneratedResponseCOT");
        assert!(hooks.recorded()["response_object"]
            .as_str()
            .unwrap()
            .contains("chain_of_thought"));
    }

    #[tokio::test]
    async fn test_missing_confidence_is_contract_violation() {
        let (generator, _) = generator(MockClient::new(DecodingMode::Json).with_response(
            GeneratedResponse::SCHEMA_NAME,
            json!({"answer": "Paris"}),
        ));
        let mut hooks = TaskHooks::default();

        let err = generator
            .generate("q", ResponseContract::Plain, &mut hooks)
            .await
            .unwrap_err();

        assert!(matches!(err, BenchError::ContractViolation { .. }));
        assert!(hooks.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_confidence_out_of_range_is_contract_violation() {
        let (generator, _) = generator(MockClient::new(DecodingMode::Json).with_response(
            GeneratedResponse::SCHEMA_NAME,
            json!({"answer": "Paris", "confidence_score": 101}),
        ));
        let mut hooks = TaskHooks::default();

        let err = generator
            .generate("q", ResponseContract::Plain, &mut hooks)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("between 0 and 100"));
        assert!(hooks.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_question_braces_are_not_expanded() {
        let (generator, client) = generator(MockClient::new(DecodingMode::Json).with_response(
            GeneratedResponse::SCHEMA_NAME,
            json!({"answer": "x", "confidence_score": 1}),
        ));
        let task = generator.task(ResponseContract::Plain);
        let mut hooks = TaskHooks::default();

        task.run("What does {{ question }} mean?", &mut hooks)
            .await
            .unwrap();
        assert!(client.requests()[0].messages[0]
            .content
            .contains("What does {{ question }} mean?"));
    }
}
