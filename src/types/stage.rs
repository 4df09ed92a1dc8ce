//! Pipeline stage identifiers (used in errors, spans and usage reports).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four generation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Column -> data model update
    ModelBuilder,
    /// Data model + entity -> `UNWIND $rows` statement
    ImportStatement,
    /// Import statement -> uniqueness constraints
    Constraint,
    /// Schema + question -> read query
    Query,
}

impl Stage {
    /// Get stage name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelBuilder => "model_builder",
            Self::ImportStatement => "import_statement",
            Self::Constraint => "constraint",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
