//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use percolate_csv_graph::agents::{Completion, CompletionProvider, CompletionRequest, TokenUsage};
use percolate_csv_graph::{PipelineConfig, PipelineError, Result, Stage};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Completion provider replaying canned responses per stage.
///
/// Every request is recorded so tests can assert on what was sent.
pub struct ScriptedProvider {
    responses: Mutex<HashMap<Stage, VecDeque<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for the next request of `stage`.
    pub fn respond(self, stage: Stage, text: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .push_back(text.into());
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, stage: Stage) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.stage == stage)
            .collect()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request.clone());

        let text = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                PipelineError::LlmError(format!("no scripted response for {}", request.stage))
            })?;

        Ok(Completion {
            text,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
                estimated_cost_usd: 0.0004,
                model: self.model().to_string(),
            },
        })
    }

    fn model(&self) -> &str {
        "gpt-4.1"
    }

    fn system(&self) -> &str {
        "scripted"
    }
}

/// Configuration with no API key, strict validation and the given modes.
pub fn config(import_llm: bool, constraint_llm: bool) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.generation.import_mode = if import_llm {
        percolate_csv_graph::GenerationMode::Llm
    } else {
        percolate_csv_graph::GenerationMode::Deterministic
    };
    config.generation.constraint_mode = if constraint_llm {
        percolate_csv_graph::GenerationMode::Llm
    } else {
        percolate_csv_graph::GenerationMode::Deterministic
    };
    config
}
