//! Generated statements: import statements, constraints and read queries.

use crate::schema::GraphSchema;
use crate::types::EntityRef;
use serde::{Deserialize, Serialize};

/// Parameterized import statement for a single entity.
///
/// Always iterates `$rows`; the caller batches rows and executes the
/// statement once per batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CypherStatement {
    /// Entity the statement imports
    pub entity: EntityRef,

    /// Statement text (no trailing `;`)
    pub text: String,
}

impl CypherStatement {
    /// Create a statement, trimming whitespace and any trailing `;`.
    pub fn new(entity: EntityRef, text: impl AsRef<str>) -> Self {
        let text = text.as_ref().trim().trim_end_matches(';').trim_end().to_string();
        Self { entity, text }
    }
}

/// Label and property a uniqueness constraint applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintTarget {
    /// Node label
    pub label: String,
    /// Property key
    pub property: String,
}

impl ConstraintTarget {
    /// Create a target.
    pub fn new(label: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            property: property.into(),
        }
    }
}

/// Uniqueness constraint declaration (`CREATE CONSTRAINT ... IF NOT EXISTS`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintStatement {
    /// Statement text (no trailing `;`)
    pub text: String,

    /// Parsed target, when the text follows the expected syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ConstraintTarget>,
}

/// Natural language question against a schema snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Schema the query must stay within
    pub schema: GraphSchema,

    /// User question
    pub question: String,
}

impl QueryRequest {
    /// Create a request.
    pub fn new(schema: GraphSchema, question: impl Into<String>) -> Self {
        Self {
            schema,
            question: question.into(),
        }
    }
}

/// Generated read query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Single executable read statement
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_trims_terminator() {
        let stmt = CypherStatement::new(EntityRef::node("Movie"), "  MATCH (n) RETURN n;\n");
        assert_eq!(stmt.text, "MATCH (n) RETURN n");
    }
}
