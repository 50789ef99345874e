//! Scripted model client for tests and offline dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{CompletionRequest, DecodingMode, ModelClient};
use crate::contract::{GeneratedResponse, GeneratedResponseCot, GradedChoice, StructuredResponse};
use crate::error::{BenchError, Result};

type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct MockState {
    queues: HashMap<&'static str, VecDeque<Value>>,
    requests: Vec<CompletionRequest>,
}

/// A [`ModelClient`] that answers from a script instead of a network.
///
/// Responses are looked up by schema name. Queued responses are consumed in
/// order; the last one queued for a schema keeps being returned. A responder
/// closure, when set, takes precedence over the queues.
pub struct MockClient {
    mode: DecodingMode,
    state: Mutex<MockState>,
    responder: Option<Responder>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockClient {
    pub fn new(mode: DecodingMode) -> Self {
        Self {
            mode,
            state: Mutex::new(MockState::default()),
            responder: None,
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Client for `--dry-run`: every answer is declined and graded not attempted.
    pub fn offline(mode: DecodingMode) -> Self {
        Self::new(mode).with_responder(|request| {
            let name = request.schema.name;
            if name == GeneratedResponse::SCHEMA_NAME {
                Ok(json!({ "answer": "", "confidence_score": 0 }))
            } else if name == GeneratedResponseCot::SCHEMA_NAME {
                Ok(json!({
                    "chain_of_thought": "dry run",
                    "answer": "",
                    "confidence_score": 0
                }))
            } else if name == GradedChoice::SCHEMA_NAME {
                Ok(json!({ "choice": "C" }))
            } else {
                Err(BenchError::contract_violation(name, "unknown schema"))
            }
        })
    }

    pub fn with_response(self, schema: &'static str, value: Value) -> Self {
        self.lock().queues.entry(schema).or_default().push_back(value);
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Value> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Delay every call, to make concurrent calls overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Highest number of calls observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn scripted(&self, request: &CompletionRequest) -> Result<Value> {
        if let Some(responder) = &self.responder {
            return responder(request);
        }

        let mut state = self.lock();
        let queue = state.queues.get_mut(request.schema.name);
        match queue {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap_or_default()),
            Some(queue) if !queue.is_empty() => Ok(queue[0].clone()),
            _ => Err(BenchError::contract_violation(
                request.schema.name,
                "no scripted response",
            )),
        }
    }
}

#[async_trait]
impl ModelClient for MockClient {
    fn mode(&self) -> DecodingMode {
        self.mode
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        self.lock().requests.push(request.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.scripted(request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
