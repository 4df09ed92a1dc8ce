//! LLM-backed generation stages.
//!
//! Each stage builds its prompt, sends it through [`LlmInvoker`] and runs
//! the deterministic checks from `rules` and `cypher` over the result.
//! The `accept` functions are synchronous so the checks can be exercised
//! without a provider.

pub mod constraint_builder;
pub mod import_builder;
pub mod model_builder;
pub mod query_builder;

pub use constraint_builder::ConstraintBuilder;
pub use import_builder::ImportBuilder;
pub use model_builder::{ModelBuilder, ModelUpdate};
pub use query_builder::QueryBuilder;

use crate::agents::{AggregatedTokenUsage, Completion, CompletionProvider, CompletionRequest, PromptBudget};
use crate::cypher::strip_markdown;
use crate::schema::SchemaValidator;
use crate::telemetry::{llm_span, record_llm_usage};
use crate::types::{PipelineError, Result, Stage};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Instrument;

/// Sends stage requests to a provider.
///
/// Every request is measured against the prompt budget first, runs inside
/// an `llm` span and has its usage added to the run total.
pub struct LlmInvoker {
    provider: Arc<dyn CompletionProvider>,
    budget: PromptBudget,
    usage: Mutex<AggregatedTokenUsage>,
}

impl LlmInvoker {
    /// Create an invoker.
    ///
    /// # Arguments
    ///
    /// * `provider` - Completion provider (HTTP client or test double)
    /// * `budget` - Prompt size check for the provider's model
    pub fn new(provider: Arc<dyn CompletionProvider>, budget: PromptBudget) -> Self {
        Self {
            provider,
            budget,
            usage: Mutex::new(AggregatedTokenUsage::default()),
        }
    }

    /// Model the provider answers with.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::PromptTooLarge` before sending if the prompt
    /// does not fit, or whatever the provider fails with
    pub async fn invoke(&self, request: &CompletionRequest) -> Result<Completion> {
        let prompt_tokens = self.budget.check(request)?;

        let span = llm_span(request.stage, self.provider.system(), self.provider.model());
        let completion = self
            .provider
            .complete(request)
            .instrument(span.clone())
            .await?;
        record_llm_usage(&span, &completion.usage);

        tracing::debug!(
            stage = %request.stage,
            prompt_tokens,
            output = %completion.text,
            "Raw LLM output"
        );

        self.lock_usage().record(request.stage, &completion.usage);
        Ok(completion)
    }

    /// Usage so far.
    pub fn usage(&self) -> AggregatedTokenUsage {
        self.lock_usage().clone()
    }

    /// Usage so far, resetting the running total.
    pub fn take_usage(&self) -> AggregatedTokenUsage {
        std::mem::take(&mut *self.lock_usage())
    }

    fn lock_usage(&self) -> MutexGuard<'_, AggregatedTokenUsage> {
        // Plain counters: a poisoned lock still holds usable totals.
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parse and validate a structured-output response.
///
/// Providers normally return bare JSON for structured requests, but some
/// OpenAI-compatible servers still wrap it in a markdown fence.
///
/// # Errors
///
/// Returns `PipelineError::MalformedOutput` if the text is not JSON or does
/// not satisfy the schema
pub(crate) fn parse_structured(stage: Stage, raw: &str, validator: &SchemaValidator) -> Result<Value> {
    let value: Value = serde_json::from_str(&strip_markdown(raw))
        .map_err(|e| PipelineError::malformed(stage, format!("response is not JSON: {}", e)))?;

    validator.validate(&value).map_err(|e| match e {
        PipelineError::ValidationError(msg) => PipelineError::malformed(stage, msg),
        other => other,
    })?;
    Ok(value)
}
