//! JSON Schema validation of structured LLM output.

use crate::types::{PipelineError, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Compiled JSON Schema for one structured-output shape.
pub struct SchemaValidator {
    schema: Value,
    compiled: JSONSchema,
}

impl SchemaValidator {
    /// Create new validator from JSON Schema.
    ///
    /// # Arguments
    ///
    /// * `schema` - JSON Schema
    ///
    /// # Returns
    ///
    /// New `SchemaValidator`
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` if schema is invalid
    pub fn new(schema: Value) -> Result<Self> {
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| PipelineError::validation(format!("Invalid JSON Schema: {}", e)))?;
        Ok(Self { schema, compiled })
    }

    /// The schema as given.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate data against schema.
    ///
    /// # Arguments
    ///
    /// * `data` - Data to validate
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` listing every violation
    pub fn validate(&self, data: &Value) -> Result<()> {
        let messages: Vec<String> = match self.compiled.validate(data) {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect(),
        };
        Err(PipelineError::validation(messages.join("; ")))
    }

    /// Check if data is valid (without error details).
    pub fn is_valid(&self, data: &Value) -> bool {
        self.compiled.is_valid(data)
    }

    /// Validate that all properties have descriptions.
    ///
    /// Output schemas are sent to the model as tool/response schemas; the
    /// model relies on the descriptions to fill each field correctly.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` naming every field without one
    pub fn validate_field_descriptions(&self) -> Result<()> {
        let mut missing = Vec::new();
        collect_undescribed(&self.schema, "", &mut missing);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::validation(format!(
                "Fields missing descriptions: {}",
                missing.join(", ")
            )))
        }
    }
}

fn collect_undescribed(schema: &Value, path: &str, missing: &mut Vec<String>) {
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        for (name, field) in props {
            let field_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", path, name)
            };
            let described = field
                .get("description")
                .and_then(Value::as_str)
                .is_some_and(|d| !d.trim().is_empty());
            if !described {
                missing.push(field_path.clone());
            }
            collect_undescribed(field, &field_path, missing);
        }
    }
    if let Some(items) = schema.get("items") {
        collect_undescribed(items, &format!("{}[]", path), missing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_field_descriptions() {
        let schema = json!({
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Article title"
                },
                "content": {
                    "type": "string"
                }
            }
        });

        let validator = SchemaValidator::new(schema).unwrap();
        let err = validator.validate_field_descriptions().unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn test_validate_reports_violations() {
        let validator = SchemaValidator::new(json!({
            "type": "object",
            "properties": {"cypher": {"type": "string", "description": "Statements"}},
            "required": ["cypher"]
        }))
        .unwrap();

        assert!(validator.is_valid(&json!({"cypher": "RETURN 1"})));
        assert!(!validator.is_valid(&json!({"cypher": 1})));
        assert!(validator.validate(&json!({})).is_err());
    }

    #[test]
    fn test_invalid_schema() {
        assert!(SchemaValidator::new(json!({"type": 12})).is_err());
    }
}
