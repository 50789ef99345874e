//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{CompletionRequest, DecodingMode, Message, ModelClient};
use crate::error::{BenchError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variables consulted for the API key, in order
pub const API_KEY_VARS: [&str; 2] = ["OPENAI_API_KEY", "QA_BENCH_API_KEY"];

/// Read the API key from the environment.
pub fn api_key_from_env() -> Result<String> {
    API_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|key| !key.trim().is_empty()))
        .ok_or(BenchError::MissingApiKey)
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    mode: DecodingMode,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        mode: DecodingMode,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            mode,
            temperature: None,
        })
    }

    /// Same HTTP connection pool, different decoding mode
    pub fn with_mode(&self, mode: DecodingMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    pub(crate) fn build_body(&self, request: &CompletionRequest) -> Value {
        let schema = &request.schema;
        let mut messages = request.messages.clone();

        let mut body = json!({ "model": request.model });

        match self.mode {
            DecodingMode::Json => {
                let schema_text =
                    serde_json::to_string_pretty(&schema.schema).unwrap_or_default();
                messages.insert(
                    0,
                    Message::system(format!(
                        "Respond only with a JSON object that conforms to this JSON schema:\n\
                         {schema_text}\n\
                         Return an instance of the schema, not the schema itself."
                    )),
                );
                body["response_format"] = json!({ "type": "json_object" });
            }
            DecodingMode::Tools => {
                body["tools"] = json!([{
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.schema,
                    }
                }]);
                body["tool_choice"] = json!({
                    "type": "function",
                    "function": { "name": schema.name }
                });
            }
            DecodingMode::JsonSchema => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": schema.name,
                        "schema": schema.schema,
                        "strict": true,
                    }
                });
            }
        }

        body["messages"] = json!(messages);
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn mode(&self) -> DecodingMode {
        self.mode
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        let body = self.build_body(request);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            status = status.as_u16(),
            mode = %self.mode,
            schema = request.schema.name,
            "chat_completion"
        );

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BenchError::Transport {
                status: Some(status.as_u16()),
                message: error_text,
            });
        }

        let response_json: Value = response.json().await?;
        extract_object(self.mode, request.schema.name, &response_json)
    }
}

/// Pull the structured object out of a chat completion response.
pub(crate) fn extract_object(mode: DecodingMode, schema: &str, response: &Value) -> Result<Value> {
    let message = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| BenchError::contract_violation(schema, "response contains no message"))?;

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        return Err(BenchError::contract_violation(
            schema,
            format!("model refused: {}", refusal),
        ));
    }

    match mode {
        DecodingMode::Tools => {
            let arguments = message
                .get("tool_calls")
                .and_then(|t| t.as_array())
                .and_then(|arr| arr.first())
                .and_then(|call| call.get("function"))
                .and_then(|f| f.get("arguments"))
                .and_then(|a| a.as_str())
                .ok_or_else(|| {
                    BenchError::contract_violation(schema, "response contains no tool call")
                })?;
            serde_json::from_str(arguments).map_err(|e| {
                BenchError::contract_violation(schema, format!("invalid tool arguments: {}", e))
            })
        }
        DecodingMode::Json | DecodingMode::JsonSchema => {
            let content = message
                .get("content")
                .and_then(|c| c.as_str())
                .ok_or_else(|| {
                    BenchError::contract_violation(schema, "response contains no content")
                })?;
            parse_json_content(content).ok_or_else(|| {
                BenchError::contract_violation(
                    schema,
                    format!("content is not a JSON object: {}", content),
                )
            })
        }
    }
}

/// Parse a JSON object from message content, tolerating code fences and
/// surrounding prose.
fn parse_json_content(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
