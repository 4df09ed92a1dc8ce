//! Tracing instrumentation for the pipeline.
//!
//! Span attributes follow the OpenTelemetry GenAI semantic conventions
//! where one exists:
//! - https://opentelemetry.io/docs/specs/semconv/gen-ai/gen-ai-spans/
//!
//! # LLM Call Conventions
//!
//! **Span naming**: `{pipeline.stage} {gen_ai.request.model}`
//! - Example: `model_builder gpt-4.1`, `query claude-haiku-4-5`
//!
//! **Required attributes**:
//! - `gen_ai.system`: Provider (`anthropic`, `openai`, `openai_compatible`)
//! - `gen_ai.request.model`: Requested model
//!
//! **Recorded after the call**:
//! - `gen_ai.usage.input_tokens`, `gen_ai.usage.output_tokens`, `cost_usd`
//!
//! # Stage Conventions
//!
//! Pipeline stages (one per column, entity or question) use the `INTERNAL`
//! span kind with `job.type`, `job.target`, `job.status`, `job.items`.
//!
//! # Example
//!
//! ```rust,ignore
//! use percolate_csv_graph::telemetry::{init_tracing, stage_span};
//! use percolate_csv_graph::types::Stage;
//!
//! init_tracing(false)?;
//! let span = stage_span(Stage::ImportStatement, "(:Movie)");
//! let _guard = span.entered();
//! ```

pub mod llm;
pub mod stage;
pub mod subscriber;

pub use llm::{llm_span, record_llm_usage};
pub use stage::{record_stage_metrics, stage_span};
pub use subscriber::init_tracing;
