//! LLM call instrumentation.
//!
//! One `CLIENT` span per completion request.

use crate::agents::TokenUsage;
use crate::types::Stage;
use tracing::{field, span, Level, Span};

/// Create LLM call span.
///
/// Usage fields are declared empty and filled by [`record_llm_usage`]
/// once the completion returns.
///
/// # Arguments
///
/// * `stage` - Pipeline stage issuing the request
/// * `system` - Provider name (`gen_ai.system`)
/// * `model` - Requested model (`gen_ai.request.model`)
///
/// # Returns
///
/// Tracing span with GenAI attributes
///
/// # Example
///
/// ```rust,ignore
/// let span = llm_span(Stage::Query, "openai", "gpt-4.1");
/// let completion = provider.complete(&request).instrument(span.clone()).await?;
/// record_llm_usage(&span, &completion.usage);
/// ```
pub fn llm_span(stage: Stage, system: &str, model: &str) -> Span {
    span!(
        Level::INFO,
        "llm",
        otel.name = %format!("{} {}", stage.as_str(), model),
        otel.kind = "client",
        gen_ai.system = system,
        gen_ai.request.model = model,
        pipeline.stage = stage.as_str(),
        gen_ai.usage.input_tokens = field::Empty,
        gen_ai.usage.output_tokens = field::Empty,
        cost_usd = field::Empty,
    )
}

/// Record token usage on an LLM span.
///
/// # Arguments
///
/// * `span` - Span created by [`llm_span`]
/// * `usage` - Usage reported by the completion
pub fn record_llm_usage(span: &Span, usage: &TokenUsage) {
    span.record("gen_ai.usage.input_tokens", usage.input_tokens);
    span.record("gen_ai.usage.output_tokens", usage.output_tokens);
    span.record("cost_usd", usage.estimated_cost_usd);
}
