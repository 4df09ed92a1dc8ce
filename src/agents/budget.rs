//! Token-aware prompt budgeting
//!
//! Measures prompts with tiktoken-rs before they are sent so an oversized
//! data model fails fast with `PromptTooLarge` instead of a provider error.
//!
//! ```text
//! limit = context_window - response_reserve
//! ```
//!
//! where `response_reserve` is the configured `max_tokens`.

use crate::agents::client::CompletionRequest;
use crate::types::{PipelineError, Result};
use tiktoken_rs::CoreBPE;

/// Model context window size in tokens
///
/// | Model | Context Window |
/// |-------|---------------|
/// | claude-* | 200,000 |
/// | gpt-4.1* | 128,000 |
/// | gpt-4o* | 128,000 |
///
/// Unknown models get a conservative 100k.
pub fn context_window(model: &str) -> usize {
    if model.starts_with("claude") {
        200_000
    } else if model.starts_with("gpt-4.1") || model.starts_with("gpt-4o") {
        128_000
    } else {
        tracing::warn!(
            model = %model,
            "Unknown model context window - using 100k default"
        );
        100_000
    }
}

/// Prompt size check for one model.
pub struct PromptBudget {
    pub(crate) model: String,
    pub(crate) context_window: usize,
    pub(crate) response_reserve: usize,
    bpe: Option<CoreBPE>,
}

impl PromptBudget {
    /// Create a budget
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (selects tokenizer and context window)
    /// * `context_window_override` - Replaces the model's context window
    /// * `response_reserve` - Tokens kept free for the response
    pub fn new(model: &str, context_window_override: Option<usize>, response_reserve: usize) -> Self {
        // Claude models are not in tiktoken's table; cl100k_base is close enough.
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| tiktoken_rs::cl100k_base())
            .ok();
        if bpe.is_none() {
            tracing::warn!(model = %model, "No tokenizer available - estimating 4 chars per token");
        }

        Self {
            model: model.to_string(),
            context_window: context_window_override.unwrap_or_else(|| context_window(model)),
            response_reserve,
            bpe,
        }
    }

    /// Model the budget was built for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Estimate token count for content
    ///
    /// Uses tiktoken-rs when available. Falls back to char count / 4.
    pub fn estimate_tokens(&self, content: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(content).len(),
            None => (content.chars().count() / 4).max(1),
        }
    }

    /// Largest prompt (in tokens) this budget accepts.
    pub fn limit(&self) -> usize {
        self.context_window.saturating_sub(self.response_reserve)
    }

    /// Measure a request against the budget.
    ///
    /// Counts the system prompt, user prompt and output schema.
    ///
    /// # Returns
    ///
    /// Estimated prompt tokens
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::PromptTooLarge` if the prompt exceeds the limit
    pub fn check(&self, request: &CompletionRequest) -> Result<usize> {
        let schema_tokens = request
            .output_schema
            .as_ref()
            .map_or(0, |s| self.estimate_tokens(&s.to_string()));
        let tokens = self.estimate_tokens(&request.system_prompt)
            + self.estimate_tokens(&request.user_prompt)
            + schema_tokens;

        let limit = self.limit();
        if tokens > limit {
            return Err(PipelineError::PromptTooLarge { tokens, limit });
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    #[test]
    fn test_context_window() {
        assert_eq!(context_window("claude-haiku-4-5"), 200_000);
        assert_eq!(context_window("gpt-4.1"), 128_000);
        assert_eq!(context_window("unknown-model"), 100_000);
    }

    #[test]
    fn test_estimate_tokens() {
        let budget = PromptBudget::new("gpt-4.1", None, 4096);
        let tokens = budget.estimate_tokens("Hello world");
        assert!(tokens >= 2 && tokens <= 3);
        assert_eq!(budget.limit(), 128_000 - 4096);
    }

    #[test]
    fn test_prompt_too_large() {
        let budget = PromptBudget::new("gpt-4.1", Some(200), 100);
        let small = CompletionRequest::text(Stage::Query, "Answer briefly.", "What is Top Gun?");
        assert!(budget.check(&small).is_ok());

        let large = CompletionRequest::text(Stage::Query, "Answer briefly.", "movie ".repeat(500));
        assert!(matches!(
            budget.check(&large),
            Err(PipelineError::PromptTooLarge { limit: 100, .. })
        ));
    }
}
