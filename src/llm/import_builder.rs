//! Import-statement generator: one `UNWIND $rows` statement per entity.

use crate::agents::CompletionRequest;
use crate::config::GenerationMode;
use crate::cypher::{lint_import_statement, render_import, strip_markdown};
use crate::cypher::text::split_statements;
use crate::llm::LlmInvoker;
use crate::types::{CypherStatement, DataModel, EntityRef, PipelineError, Result, Stage};

/// Import-statement stage.
pub struct ImportBuilder {
    mode: GenerationMode,
    strict: bool,
}

impl ImportBuilder {
    /// Create the stage.
    ///
    /// # Arguments
    ///
    /// * `mode` - Prompt the LLM or render from the model
    /// * `strict` - Turn lint findings into `PolicyViolation` errors
    pub fn new(mode: GenerationMode, strict: bool) -> Self {
        Self { mode, strict }
    }

    /// Generation mode in use.
    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// System prompt with every import policy.
    pub fn build_system_prompt() -> String {
        r#"Based on the data model, write a Cypher statement to import the following data from a CSV file into Neo4j.

Do not use LOAD CSV as this data will be imported using the Neo4j driver, use UNWIND on the $rows parameter instead.

You are writing a multi-pass import process, so concentrate on the entity mentioned.

When importing data, you must use the following guidelines:
* Follow the instructions in the description when identifying primary keys.
* Use the instructions in the description to determine the format of properties.
* When combining fields into an ID, use the apoc.text.slug function to convert any text to slug case and toLower to convert the string to lowercase - apoc.text.slug(toLower(row.`name`))
* If you split a property, convert it to a string and use the trim function to remove any whitespace - trim(toString(row.`name`))
* When combining properties, wrap each property in the coalesce function so the property is not null if one of the values is not set - coalesce(row.`id`, '') + '_' + coalesce(row.`title`, '')
* Use the `column_name` field to map the CSV column to the property in the data model.
* Wrap all column names from the CSV in backticks - for example row.`column_name`.
* When you merge nodes, merge on the unique identifier and nothing else. All other properties should be set using `SET`.
* Do not use apoc.periodic.iterate, the files will be batched in the application.

Return only the Cypher statement."#
            .to_string()
    }

    /// User prompt: the whole model plus the entity to import.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownEntity` if the entity is not in the model
    pub fn build_user_prompt(model: &DataModel, entity: &EntityRef) -> Result<String> {
        let slice = model.entity_slice(entity)?;
        Ok(format!(
            "Data Model:\n```\n{}\n```\n\nCurrent Entity:\n```\n{}\n```",
            model.to_json_pretty()?,
            serde_json::to_string_pretty(&slice)?
        ))
    }

    /// Check a raw LLM response and wrap it as the entity's statement.
    ///
    /// # Errors
    ///
    /// - `PipelineError::MalformedOutput` if the response is empty or holds
    ///   more than one statement
    /// - `PipelineError::PolicyViolation` in strict mode when lint finds problems
    pub fn accept(&self, model: &DataModel, entity: &EntityRef, raw: &str) -> Result<CypherStatement> {
        let text = strip_markdown(raw);
        match split_statements(&text).len() {
            0 => return Err(PipelineError::malformed(Stage::ImportStatement, "empty statement")),
            1 => {}
            n => {
                return Err(PipelineError::malformed(
                    Stage::ImportStatement,
                    format!("expected one statement for {}, got {}", entity, n),
                ))
            }
        }

        let statement = CypherStatement::new(entity.clone(), text);
        self.check(statement, model)
    }

    fn check(&self, statement: CypherStatement, model: &DataModel) -> Result<CypherStatement> {
        let violations = lint_import_statement(&statement, model);
        if violations.is_empty() {
            return Ok(statement);
        }
        if self.strict {
            return Err(PipelineError::PolicyViolation {
                stage: Stage::ImportStatement,
                violations,
            });
        }
        for violation in &violations {
            tracing::warn!(entity = %statement.entity, violation = %violation, "Import statement finding");
        }
        Ok(statement)
    }

    /// Generate the import statement for one entity.
    ///
    /// # Arguments
    ///
    /// * `llm` - Invoker used in `llm` mode
    /// * `model` - Finalized data model
    /// * `entity` - Entity to import
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownEntity` for entities outside the model,
    /// plus any error of [`ImportBuilder::accept`] or the provider
    pub async fn generate(
        &self,
        llm: &LlmInvoker,
        model: &DataModel,
        entity: &EntityRef,
    ) -> Result<CypherStatement> {
        if !model.contains(entity) {
            return Err(PipelineError::UnknownEntity(entity.to_string()));
        }

        match self.mode {
            GenerationMode::Deterministic => self.check(render_import(model, entity)?, model),
            GenerationMode::Llm => {
                let request = CompletionRequest::text(
                    Stage::ImportStatement,
                    Self::build_system_prompt(),
                    Self::build_user_prompt(model, entity)?,
                );
                let completion = llm.invoke(&request).await?;
                self.accept(model, entity, &completion.text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::example_model;

    #[test]
    fn test_system_prompt_generation() {
        let prompt = ImportBuilder::build_system_prompt();
        assert!(prompt.contains("Do not use LOAD CSV"));
        assert!(prompt.contains("UNWIND on the $rows parameter"));
        assert!(prompt.contains("apoc.text.slug(toLower("));
        assert!(prompt.contains("merge on the unique identifier and nothing else"));
    }

    #[test]
    fn test_user_prompt_generation() {
        let prompt =
            ImportBuilder::build_user_prompt(&example_model(), &EntityRef::node("Genre")).unwrap();
        assert!(prompt.contains("Current Entity:"));
        assert!(prompt.contains("\"column_name\": \"genres\""));

        let missing = ImportBuilder::build_user_prompt(&example_model(), &EntityRef::node("Studio"));
        assert!(matches!(missing, Err(PipelineError::UnknownEntity(_))));
    }

    #[test]
    fn test_accept_fenced_statement() {
        let model = example_model();
        let entity = EntityRef::node("Movie");
        let rendered = render_import(&model, &entity).unwrap();
        let raw = format!("```cypher\n{};\n```", rendered.text);

        let stmt = ImportBuilder::new(GenerationMode::Llm, true)
            .accept(&model, &entity, &raw)
            .unwrap();
        assert_eq!(stmt, rendered);
    }

    #[test]
    fn test_strict_mode_rejects_load_csv() {
        let model = example_model();
        let entity = EntityRef::node("Movie");
        let raw = "LOAD CSV WITH HEADERS FROM 'file:///movies.csv' AS row \
                   MERGE (m:Movie {title: row.title, released: row.released})";

        let strict = ImportBuilder::new(GenerationMode::Llm, true).accept(&model, &entity, raw);
        match strict {
            Err(PipelineError::PolicyViolation { stage, violations }) => {
                assert_eq!(stage, Stage::ImportStatement);
                assert!(violations.iter().any(|v| v.contains("LOAD CSV")));
            }
            other => panic!("expected policy violation, got {:?}", other),
        }

        let lenient = ImportBuilder::new(GenerationMode::Llm, false).accept(&model, &entity, raw);
        assert!(lenient.is_ok());
    }

    #[test]
    fn test_accept_rejects_multiple_statements() {
        let model = example_model();
        let entity = EntityRef::node("Movie");
        let raw = "UNWIND $rows AS row MERGE (n:Movie {title: row.`title`}); MATCH (n) RETURN n";
        let result = ImportBuilder::new(GenerationMode::Llm, false).accept(&model, &entity, raw);
        assert!(matches!(result, Err(PipelineError::MalformedOutput { .. })));
    }
}
