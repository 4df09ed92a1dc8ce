//! Constraint generator: uniqueness constraints for the keys an import
//! statement merges or matches on.

use crate::agents::CompletionRequest;
use crate::config::GenerationMode;
use crate::cypher::{derive_constraints, merge_keys, split_constraints};
use crate::llm::{parse_structured, LlmInvoker};
use crate::schema::{cypher_output_schema, SchemaValidator};
use crate::types::{ConstraintStatement, CypherStatement, PipelineError, Result, Stage};

/// Constraint stage.
pub struct ConstraintBuilder {
    mode: GenerationMode,
    validator: SchemaValidator,
}

impl ConstraintBuilder {
    /// Create the stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` if the output schema does not compile
    pub fn new(mode: GenerationMode) -> Result<Self> {
        Ok(Self {
            mode,
            validator: SchemaValidator::new(cypher_output_schema())?,
        })
    }

    /// Generation mode in use.
    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// System prompt with the required constraint syntax.
    pub fn build_system_prompt() -> String {
        r#"You are an expert graph database administrator.
Use the following Cypher statement to write a Cypher statement to
create unique constraints on any properties used in a MERGE statement.

The correct syntax for a unique constraint is:
CREATE CONSTRAINT movie_title_id IF NOT EXISTS FOR (m:Movie) REQUIRE m.title IS UNIQUE;

Separate multiple constraints with ';'. Return an empty string if the statement merges on no properties."#
            .to_string()
    }

    /// User prompt: the import statement.
    pub fn build_user_prompt(statement: &CypherStatement) -> String {
        format!("Cypher:\n```\n{}\n```", statement.text)
    }

    /// Split a structured `{"cypher": ...}` response into constraints.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MalformedOutput` if the response does not
    /// match the output schema or a segment is not a conditional constraint
    pub fn accept(&self, statement: &CypherStatement, raw: &str) -> Result<Vec<ConstraintStatement>> {
        let value = parse_structured(Stage::Constraint, raw, &self.validator)?;
        let cypher = value["cypher"]
            .as_str()
            .ok_or_else(|| PipelineError::malformed(Stage::Constraint, "`cypher` is not a string"))?;

        let constraints = split_constraints(cypher)?;

        let uncovered: Vec<String> = merge_keys(&statement.text)
            .into_iter()
            .filter(|key| !constraints.iter().any(|c| c.target.as_ref() == Some(key)))
            .map(|key| format!("{}.{}", key.label, key.property))
            .collect();
        if !uncovered.is_empty() {
            tracing::warn!(
                entity = %statement.entity,
                keys = ?uncovered,
                "Merge keys without a uniqueness constraint"
            );
        }

        Ok(constraints)
    }

    /// Generate the constraints for one import statement.
    ///
    /// A statement without merge keys yields an empty list.
    ///
    /// # Errors
    ///
    /// Any error of [`ConstraintBuilder::accept`], plus provider and prompt
    /// budget errors
    pub async fn generate(
        &self,
        llm: &LlmInvoker,
        statement: &CypherStatement,
    ) -> Result<Vec<ConstraintStatement>> {
        match self.mode {
            GenerationMode::Deterministic => Ok(derive_constraints(statement)),
            GenerationMode::Llm => {
                let request = CompletionRequest::structured(
                    Stage::Constraint,
                    Self::build_system_prompt(),
                    Self::build_user_prompt(statement),
                    self.validator.schema().clone(),
                );
                let completion = llm.invoke(&request).await?;
                self.accept(statement, &completion.text)
            }
        }
    }
}
