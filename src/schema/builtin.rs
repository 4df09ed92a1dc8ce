//! Built-in output schemas and the worked example model.
//!
//! - `data_model` - structured output of the model builder
//! - `cypher_output` - structured output of the constraint generator
//!
//! Every field carries a description: the schemas are handed to the LLM
//! verbatim (forced tool input or `json_schema` response format).

use crate::types::{
    DataModel, NodeDef, Preparation, PropertyDef, PropertyType, RelationshipDef,
};
use serde_json::{json, Value};

fn property_schema() -> Value {
    json!({
        "type": "object",
        "description": "Property stored on a node or relationship",
        "properties": {
            "key": {
                "type": "string",
                "description": "Property key in lowerCamelCase, alphabetic characters only (e.g., 'title', 'releaseYear')"
            },
            "type": {
                "type": "string",
                "enum": ["STRING", "INTEGER", "FLOAT", "BOOLEAN", "DATE", "DATE_TIME", "LIST"],
                "description": "Property type after data preparation"
            },
            "column_name": {
                "type": "string",
                "description": "Original CSV column the property reads from, when it differs from the key"
            },
            "composite_of": {
                "type": "array",
                "items": {"type": "string", "description": "CSV column name"},
                "description": "Columns combined into a composite identifier (slugged, lower-cased)"
            },
            "description": {
                "type": "string",
                "description": "What the property holds, the column it was renamed from and any data preparation applied"
            },
            "unique": {
                "type": "boolean",
                "description": "True for the single property that uniquely identifies the node"
            },
            "preparation": {
                "type": "array",
                "description": "Data preparation steps, applied in order",
                "items": {
                    "type": "object",
                    "description": "One preparation step",
                    "properties": {
                        "kind": {
                            "type": "string",
                            "enum": ["cast", "split", "trim"],
                            "description": "Step kind"
                        },
                        "to": {
                            "type": "string",
                            "enum": ["STRING", "INTEGER", "FLOAT", "BOOLEAN", "DATE", "DATE_TIME", "LIST"],
                            "description": "Target type of a cast step"
                        },
                        "delimiter": {
                            "type": "string",
                            "description": "Delimiter of a split step (e.g., '|')"
                        }
                    },
                    "required": ["kind"]
                }
            }
        },
        "required": ["key", "type", "description"]
    })
}

/// JSON Schema for the data model returned by the model builder.
///
/// # Returns
///
/// JSON Schema with `nodes` and `relationships` arrays
pub fn data_model_schema() -> Value {
    json!({
        "title": "DataModel",
        "type": "object",
        "description": "Graph data model for a CSV file",
        "properties": {
            "nodes": {
                "type": "array",
                "description": "Node definitions; keep every node of the existing model",
                "items": {
                    "type": "object",
                    "description": "Node definition",
                    "properties": {
                        "label": {
                            "type": "string",
                            "description": "Node label in UpperCamelCase (e.g., 'Movie')"
                        },
                        "description": {
                            "type": "string",
                            "description": "What the node represents"
                        },
                        "properties": {
                            "type": "array",
                            "description": "Node properties",
                            "items": property_schema()
                        }
                    },
                    "required": ["label", "properties"]
                }
            },
            "relationships": {
                "type": "array",
                "description": "Relationship definitions; keep every relationship of the existing model",
                "items": {
                    "type": "object",
                    "description": "Relationship definition",
                    "properties": {
                        "type": {
                            "type": "string",
                            "description": "Relationship type in UPPER_SNAKE_CASE (e.g., 'ACTED_IN')"
                        },
                        "startLabel": {
                            "type": "string",
                            "description": "Label of the start node"
                        },
                        "endLabel": {
                            "type": "string",
                            "description": "Label of the end node"
                        },
                        "description": {
                            "type": "string",
                            "description": "What the relationship represents"
                        },
                        "properties": {
                            "type": "array",
                            "description": "Relationship properties",
                            "items": property_schema()
                        }
                    },
                    "required": ["type", "startLabel", "endLabel"]
                }
            }
        },
        "required": ["nodes", "relationships"]
    })
}

/// JSON Schema for the constraint generator output.
///
/// # Returns
///
/// JSON Schema with a single `cypher` string of `;`-separated statements
pub fn cypher_output_schema() -> Value {
    json!({
        "title": "CypherOutput",
        "type": "object",
        "description": "Generated Cypher statements",
        "properties": {
            "cypher": {
                "type": "string",
                "description": "One or more Cypher statements separated by ';'"
            }
        },
        "required": ["cypher"]
    })
}

/// Worked example passed to every model-builder call.
///
/// Shows an entity (`Person`, `Movie`), a relationship (`ACTED_IN`) with a
/// property, a renamed id column, a cast, and a multi-valued column
/// promoted to a shared-attribute node (`Genre`).
pub fn example_model() -> DataModel {
    DataModel {
        nodes: vec![
            NodeDef::new(
                "Person",
                vec![
                    PropertyDef::new("id", PropertyType::String)
                        .with_column("person_id")
                        .with_description("Unique person identifier. Mapped from column `person_id`.")
                        .unique(),
                    PropertyDef::new("name", PropertyType::String)
                        .with_description("Full name. Preparation: trim whitespace.")
                        .with_preparation(Preparation::Trim),
                ],
            )
            .with_description("An actor"),
            NodeDef::new(
                "Movie",
                vec![
                    PropertyDef::new("title", PropertyType::String)
                        .with_description("Movie title")
                        .unique(),
                    PropertyDef::new("released", PropertyType::Integer)
                        .with_description("Year of release. Preparation: cast to INTEGER.")
                        .with_preparation(Preparation::Cast {
                            to: PropertyType::Integer,
                        }),
                ],
            )
            .with_description("A film"),
            NodeDef::new(
                "Genre",
                vec![PropertyDef::new("name", PropertyType::String)
                    .with_column("genres")
                    .with_description(
                        "Genre name. Mapped from column `genres`. Preparation: split on '|', then trim whitespace.",
                    )
                    .with_preparation(Preparation::Split {
                        delimiter: "|".to_string(),
                    })
                    .with_preparation(Preparation::Trim)
                    .unique()],
            )
            .with_description("Shared attribute: a genre several movies belong to"),
        ],
        relationships: vec![
            RelationshipDef::new(
                "ACTED_IN",
                "Person",
                "Movie",
                vec![PropertyDef::new("role", PropertyType::String)
                    .with_description("Character played")],
            )
            .with_description("Person acted in a movie"),
            RelationshipDef::new("IN_GENRE", "Movie", "Genre", vec![])
                .with_description("Movie belongs to a genre"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::lint_preparation;
    use crate::schema::SchemaValidator;

    #[test]
    fn test_builtin_schemas_describe_every_field() {
        for schema in [data_model_schema(), cypher_output_schema()] {
            let validator = SchemaValidator::new(schema).unwrap();
            validator.validate_field_descriptions().unwrap();
        }
    }

    #[test]
    fn test_example_model_conforms() {
        let model = example_model();
        let value = serde_json::to_value(&model).unwrap();
        let validator = SchemaValidator::new(data_model_schema()).unwrap();
        validator.validate(&value).unwrap();
        assert!(lint_preparation(&model).is_empty());
        assert!(crate::rules::check_model_naming(&model).is_empty());
    }
}
