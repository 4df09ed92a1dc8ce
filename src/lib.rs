//! Percolate CSV-Graph - LLM-driven CSV to Neo4j import pipeline
//!
//! Turns inspected CSV columns into a graph data model, then into
//! parameterized import statements, uniqueness constraints and read-only
//! queries. The LLM does the generation; this crate supplies the
//! orchestration and every rule the prompts state as a deterministic check.
//!
//! Components:
//! - `pipeline`: stage orchestration and the `ImportPlan`
//! - `llm`: prompts and output handling for the four stages
//! - `agents`: LLM HTTP client, prompt budgets, token usage
//! - `rules`: naming, data preparation and additive merge rules
//! - `cypher`: deterministic import/constraint rendering and Cypher checks
//! - `schema`: JSON Schemas for structured output and the textual graph schema
//! - `config`, `telemetry`, `types`
//!
//! # Example
//!
//! ```rust,ignore
//! use percolate_csv_graph::{ColumnDescriptor, Pipeline, QueryRequest, GraphSchema};
//!
//! let pipeline = Pipeline::from_env()?;
//! let model = pipeline.build_model_from(&columns).await?;
//! let plan = pipeline.plan_import(&model).await?;
//! println!("{}", plan.to_script());
//!
//! let answer = pipeline
//!     .ask(&QueryRequest::new(GraphSchema::from_model(&model), "How many people acted in Top Gun?"))
//!     .await?;
//! ```

pub mod agents;
pub mod config;
pub mod cypher;
pub mod llm;
pub mod pipeline;
pub mod rules;
pub mod schema;
pub mod telemetry;
pub mod types;

pub use agents::{AggregatedTokenUsage, CompletionProvider, CompletionRequest, LlmClient, TokenUsage};
pub use config::{GenerationMode, PipelineConfig};
pub use pipeline::{ImportPlan, Pipeline};
pub use rules::ConflictPolicy;
pub use schema::GraphSchema;
pub use types::{
    ColumnDescriptor, ConstraintStatement, CypherStatement, DataModel, EntityRef, PipelineError,
    QueryRequest, QueryResponse, Result, Stage,
};
