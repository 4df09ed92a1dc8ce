//! Core data types for the CSV-to-graph pipeline.
//!
//! Defines fundamental types used throughout the system:
//! - `ColumnDescriptor`: One inspected CSV column (model builder input)
//! - `DataModel`: Accumulating graph model (nodes, relationships, properties)
//! - `CypherStatement` / `ConstraintStatement`: Generated import artefacts
//! - `PipelineError`: Error types for all operations
//! - `Result`: Convenient result type alias

pub mod error;
pub mod model;
pub mod result;
pub mod stage;
pub mod statement;

pub use error::PipelineError;
pub use model::{
    ColumnDescriptor, DataModel, EntityRef, NodeDef, Preparation, PropertyDef, PropertyType,
    RelationshipDef,
};
pub use result::Result;
pub use stage::Stage;
pub use statement::{
    ConstraintStatement, ConstraintTarget, CypherStatement, QueryRequest, QueryResponse,
};
