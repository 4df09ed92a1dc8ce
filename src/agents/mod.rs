//! LLM access: HTTP client, prompt budgeting and usage tracking.

pub mod budget;
pub mod client;
pub mod usage;

pub use budget::PromptBudget;
pub use client::{Completion, CompletionProvider, CompletionRequest, LlmClient, TokenUsage};
pub use usage::AggregatedTokenUsage;
