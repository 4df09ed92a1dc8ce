//! Schemas: the graph schema snapshot, structured-output JSON Schemas and validation.

pub mod builtin;
pub mod graph;
pub mod validator;

pub use builtin::{cypher_output_schema, data_model_schema, example_model};
pub use graph::{GraphSchema, SchemaPattern, SchemaProperty};
pub use validator::SchemaValidator;
