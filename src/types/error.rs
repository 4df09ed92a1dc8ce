//! Error types for the CSV-to-graph pipeline.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.

use crate::types::Stage;
use thiserror::Error;

/// Error type for every pipeline operation.
///
/// Generation steps never fail silently: malformed structured output,
/// policy violations in generated Cypher and out-of-schema references are
/// all surfaced to the orchestrator as distinct variants.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration missing or invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// LLM request failed (API error, empty response)
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// Structured output did not match the expected shape
    #[error("Malformed {stage} output: {reason}")]
    MalformedOutput {
        /// Stage that produced the output
        stage: Stage,
        /// What was wrong with it
        reason: String,
    },

    /// Value failed validation (naming rules, JSON Schema, ...)
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Generated statement broke one or more generation policies
    #[error("{stage} output violates policy: {}", .violations.join("; "))]
    PolicyViolation {
        /// Stage that produced the statement
        stage: Stage,
        /// Human readable findings
        violations: Vec<String>,
    },

    /// Generated query references something outside the schema
    #[error("Query violates schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    /// Additive merge hit a conflict the policy refuses to resolve
    #[error("Merge conflict on {element}: {detail}")]
    MergeConflict {
        /// Element path, e.g. `Movie.title`
        element: String,
        /// Conflicting values
        detail: String,
    },

    /// Entity not present in the data model
    #[error("Entity not found in data model: {0}")]
    UnknownEntity(String),

    /// Model declined to produce a query (or wrapped it in prose)
    #[error("Query generation refused: {0}")]
    QueryRefused(String),

    /// Prompt does not fit the model context window
    #[error("Prompt too large: {tokens} tokens exceeds limit of {limit}")]
    PromptTooLarge {
        /// Estimated prompt tokens
        tokens: usize,
        /// Usable tokens for the model
        limit: usize,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Create a validation error with context.
    ///
    /// # Arguments
    ///
    /// * `msg` - Error message
    ///
    /// # Returns
    ///
    /// `PipelineError::ValidationError`
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a malformed-output error for a stage.
    pub fn malformed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            stage,
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable.
    ///
    /// Transport failures and malformed generations can be retried by the
    /// orchestrator (a fresh completion may well conform). Configuration,
    /// policy and schema errors are deterministic and will not go away.
    ///
    /// # Returns
    ///
    /// `true` if operation can be retried, `false` otherwise
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::LlmError(_) | Self::HttpError(_) | Self::MalformedOutput { .. } => true,
            Self::PolicyViolation { .. } | Self::SchemaViolation(_) | Self::QueryRefused(_) => true,
            Self::ConfigError(_)
            | Self::ValidationError(_)
            | Self::MergeConflict { .. }
            | Self::UnknownEntity(_)
            | Self::PromptTooLarge { .. }
            | Self::JsonError(_)
            | Self::YamlError(_)
            | Self::IoError(_)
            | Self::InternalError(_) => false,
        }
    }
}
