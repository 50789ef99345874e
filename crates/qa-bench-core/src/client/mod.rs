//! Model-calling clients.
//!
//! A [`ModelClient`] turns a chat prompt plus a [`ResponseSchema`] into a raw
//! JSON object; [`complete_structured`] then validates that object against the
//! typed contract. How schema conformance is coaxed out of the model is the
//! client's [`DecodingMode`].

pub mod mock;
pub mod openai;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{parse_structured, ResponseSchema, StructuredResponse};
use crate::error::{BenchError, Result};

pub use mock::MockClient;
pub use openai::OpenAiClient;

/// Strategy for coercing model output into a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodingMode {
    /// JSON object response format, schema described in a system message
    Json,
    /// Forced function call whose parameters are the schema
    Tools,
    /// Strict response-format schema
    JsonSchema,
}

impl DecodingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodingMode::Json => "json",
            DecodingMode::Tools => "tools",
            DecodingMode::JsonSchema => "json_schema",
        }
    }
}

impl fmt::Display for DecodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecodingMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "json" => Ok(DecodingMode::Json),
            "tools" | "tool_call" => Ok(DecodingMode::Tools),
            "json_schema" => Ok(DecodingMode::JsonSchema),
            other => Err(BenchError::unsupported(
                "decoding mode",
                other,
                "json, tools, json_schema",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub schema: ResponseSchema,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// How this client enforces schema conformance
    fn mode(&self) -> DecodingMode;

    /// Run one completion and return the raw structured object.
    ///
    /// Transport problems surface as [`BenchError::Transport`]; a response
    /// that contains no parseable object is a [`BenchError::ContractViolation`].
    async fn complete(&self, request: &CompletionRequest) -> Result<Value>;
}

/// Request a `T` from the model and validate it against its contract.
pub async fn complete_structured<T: StructuredResponse>(
    client: &dyn ModelClient,
    model: &str,
    messages: Vec<Message>,
) -> Result<T> {
    let request = CompletionRequest {
        model: model.to_string(),
        messages,
        schema: T::response_schema(),
    };
    let value = client.complete(&request).await?;
    parse_structured(value)
}
