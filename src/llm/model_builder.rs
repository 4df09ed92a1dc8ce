//! Model builder: fits one CSV column into the running data model.

use crate::llm::{parse_structured, LlmInvoker};
use crate::agents::CompletionRequest;
use crate::rules::{
    check_model_naming, ensure_preparation, lint_preparation, merge_models, normalize_model,
    verify_additive, ConflictPolicy, Rename,
};
use crate::schema::{data_model_schema, example_model, SchemaValidator};
use crate::types::{ColumnDescriptor, DataModel, PipelineError, Result, Stage};

/// Result of one model-builder pass.
#[derive(Debug, Clone)]
pub struct ModelUpdate {
    /// Merged model (superset of the model the pass started from)
    pub model: DataModel,

    /// Names the naming rules changed in the proposal
    pub renames: Vec<Rename>,

    /// Elements the pass introduced
    pub added: Vec<String>,

    /// Existing elements the proposal left out (kept anyway)
    pub restored: Vec<String>,

    /// Description/type disagreements resolved by the conflict policy
    pub conflicts: Vec<String>,
}

/// Model-builder stage.
pub struct ModelBuilder {
    policy: ConflictPolicy,
    validator: SchemaValidator,
    example: String,
}

impl ModelBuilder {
    /// Create the stage.
    ///
    /// # Arguments
    ///
    /// * `policy` - How to reconcile elements the proposal redefines
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` if the data model schema
    /// does not compile, `PipelineError::JsonError` if the worked example
    /// cannot be serialized
    pub fn new(policy: ConflictPolicy) -> Result<Self> {
        Ok(Self {
            policy,
            validator: SchemaValidator::new(data_model_schema())?,
            example: example_model().to_json_pretty()?,
        })
    }

    /// Conflict policy in use.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// System prompt: role, classification questions, naming and
    /// preparation rules, worked example.
    pub fn build_system_prompt(&self) -> String {
        format!(
            r#"You are an expert Graph Database administrator.
Your task is to design a data model based on the information provided from an existing data source.

You must decide where the following column fits in with the existing data model. Consider:
* Does the column represent an entity, for example a Person, Place, or Movie? If so, this should be a node in its own right.
* Does the column represent a relationship between two entities? If so, this should be a relationship between two nodes.
* Does the column represent an attribute of an entity or relationship? If so, this should be a property of a node or relationship.
* Does the column represent a shared attribute that could be interesting to query through to find similar nodes, for example a Genre? If so, this should be a node in its own right.

## Instructions for Nodes

* Node labels are generally nouns, for example Person, Place, or Movie
* Node labels should be in UpperCamelCase

## Instructions for Relationships

* Relationships are generally verbs, for example ACTED_IN, DIRECTED, or PURCHASED
* Examples of good relationships are (:Person)-[:ACTED_IN]->(:Movie) or (:Person)-[:PURCHASED]->(:Product)
* Relationship types should be in UPPER_SNAKE_CASE
* Provide any specific instructions for the field in the description. For example, does the field contain a list of comma separated values or a single value?

## Instructions for Properties

* Property keys should be in lowerCamelCase
* Prefer the shorter name where possible, for example "person_id" and "personId" should simply be "id"
* If you are changing the property name from the original field name, set `column_name` to the original field name and mention it in the description
* Do not include examples for integer or date fields
* Always include instructions on data preparation for the field. Does it need to be cast to another type or split into multiple values on a delimiting value?
* Property keys should be letters only, no numbers or special characters
* Mark the property that uniquely identifies a node with `unique: true`

## Important!

Consider the examples provided. Does any data preparation need to be done to ensure the data is in the correct format?
You must include any information about data preparation in the description.

## Example Output

Here is an example of a good output:
```
{example}
```

## Keep Existing Data Model

Apply your changes to the existing data model but never remove any existing definitions."#,
            example = self.example
        )
    }

    /// User prompt: the new column and the model so far.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::JsonError` if the model cannot be serialized
    pub fn build_user_prompt(&self, existing: &DataModel, column: &ColumnDescriptor) -> Result<String> {
        let examples = serde_json::to_string(&column.examples)?;
        Ok(format!(
            r#"## New Data:

Key: {key}
Data Type: {data_type}
Example Values: {examples}

## Existing Data Model

Here is the existing data model:
```
{model}
```"#,
            key = column.key,
            data_type = column.data_type,
            examples = examples,
            model = existing.to_json_pretty()?
        ))
    }

    /// Structured-output request for one column.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::JsonError` if the model cannot be serialized
    pub fn request(&self, existing: &DataModel, column: &ColumnDescriptor) -> Result<CompletionRequest> {
        Ok(CompletionRequest::structured(
            Stage::ModelBuilder,
            self.build_system_prompt(),
            self.build_user_prompt(existing, column)?,
            self.validator.schema().clone(),
        ))
    }

    /// Turn a raw model-builder response into the next model.
    ///
    /// Validates the response shape, applies the naming and preparation
    /// rules, then merges it additively into `existing`.
    ///
    /// # Arguments
    ///
    /// * `existing` - Model before this pass
    /// * `column` - Column the pass was about
    /// * `raw` - Structured response text
    ///
    /// # Returns
    ///
    /// `ModelUpdate` whose model contains every element of `existing`
    ///
    /// # Errors
    ///
    /// - `PipelineError::MalformedOutput` if the response is not a data model
    /// - `PipelineError::ValidationError` if a name cannot be normalized
    /// - `PipelineError::MergeConflict` under `ConflictPolicy::Reject`
    pub fn accept(&self, existing: &DataModel, column: &ColumnDescriptor, raw: &str) -> Result<ModelUpdate> {
        let value = parse_structured(Stage::ModelBuilder, raw, &self.validator)?;
        let proposed: DataModel = serde_json::from_value(value)
            .map_err(|e| PipelineError::malformed(Stage::ModelBuilder, e.to_string()))?;

        let (mut proposed, renames) = normalize_model(&proposed)?;
        let prepared = ensure_preparation(&mut proposed, column);

        let outcome = merge_models(existing, &proposed, self.policy)?;

        let removed = verify_additive(existing, &outcome.model);
        if !removed.is_empty() {
            return Err(PipelineError::InternalError(format!(
                "merge dropped existing elements: {}",
                removed.join(", ")
            )));
        }

        for rename in &renames {
            tracing::debug!(element = %rename.element, from = %rename.from, to = %rename.to, "Renamed");
        }
        if !outcome.restored.is_empty() {
            tracing::warn!(
                column = %column.key,
                restored = ?outcome.restored,
                "Model builder omitted existing elements - kept them"
            );
        }
        for finding in lint_preparation(&outcome.model)
            .into_iter()
            .chain(check_model_naming(&outcome.model))
        {
            tracing::warn!(column = %column.key, finding = %finding, "Data model finding");
        }

        tracing::info!(
            column = %column.key,
            added = outcome.added.len(),
            renames = renames.len(),
            prepared,
            conflicts = outcome.conflicts.len(),
            "Model updated"
        );

        Ok(ModelUpdate {
            model: outcome.model,
            renames,
            added: outcome.added,
            restored: outcome.restored,
            conflicts: outcome.conflicts,
        })
    }

    /// Run one model-builder pass.
    ///
    /// # Errors
    ///
    /// Any error of [`ModelBuilder::accept`], plus provider and prompt
    /// budget errors
    pub async fn build(
        &self,
        llm: &LlmInvoker,
        existing: &DataModel,
        column: &ColumnDescriptor,
    ) -> Result<ModelUpdate> {
        let request = self.request(existing, column)?;
        let completion = llm.invoke(&request).await?;
        self.accept(existing, column, &completion.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeDef, Preparation, PropertyDef, PropertyType};
    use serde_json::json;

    fn builder() -> ModelBuilder {
        ModelBuilder::new(ConflictPolicy::Append).unwrap()
    }

    fn movie_model() -> DataModel {
        DataModel {
            nodes: vec![NodeDef::new(
                "Movie",
                vec![PropertyDef::new("title", PropertyType::String)
                    .with_description("Movie title")
                    .unique()],
            )
            .with_description("A film")],
            relationships: vec![],
        }
    }

    #[test]
    fn test_system_prompt_generation() {
        let prompt = builder().build_system_prompt();
        assert!(prompt.contains("UpperCamelCase"));
        assert!(prompt.contains("UPPER_SNAKE_CASE"));
        assert!(prompt.contains("\"person_id\" and \"personId\" should simply be \"id\""));
        assert!(prompt.contains("never remove any existing definitions"));
        assert!(prompt.contains("\"IN_GENRE\""));
    }

    #[test]
    fn test_user_prompt_generation() {
        let column = ColumnDescriptor::new("released", "int64", vec!["1986".into()]);
        let prompt = builder().build_user_prompt(&movie_model(), &column).unwrap();
        assert!(prompt.contains("Key: released"));
        assert!(prompt.contains("Data Type: int64"));
        assert!(prompt.contains("[\"1986\"]"));
        assert!(prompt.contains("\"label\": \"Movie\""));
    }

    #[test]
    fn test_accept_normalizes_and_keeps_existing() {
        let column = ColumnDescriptor::new(
            "person_id",
            "string",
            vec!["p1".into(), "p2".into()],
        );
        // Proposal drops Movie and uses a raw column name as key
        let raw = json!({
            "nodes": [{
                "label": "person",
                "description": "An actor",
                "properties": [
                    {"key": "person_id", "type": "STRING", "description": "Person identifier", "unique": true}
                ]
            }],
            "relationships": []
        })
        .to_string();

        let update = builder().accept(&movie_model(), &column, &raw).unwrap();
        let person = update.model.node("Person").unwrap();
        let id = person.key_property().unwrap();
        assert_eq!(id.key, "id");
        assert_eq!(id.column_name.as_deref(), Some("person_id"));
        assert!(id.description.contains("person_id"));

        assert!(update.model.node("Movie").is_some());
        assert_eq!(update.restored, vec!["node Movie".to_string()]);
        assert!(!update.renames.is_empty());
    }

    #[test]
    fn test_accept_adds_preparation() {
        let column = ColumnDescriptor::new(
            "genres",
            "string",
            vec!["Action|Drama".into(), "Comedy".into()],
        );
        let raw = json!({
            "nodes": [{
                "label": "Movie",
                "description": "A film",
                "properties": [
                    {"key": "title", "type": "STRING", "description": "Movie title", "unique": true},
                    {"key": "genres", "type": "LIST", "description": "Genres of the movie"}
                ]
            }],
            "relationships": []
        })
        .to_string();

        let update = builder().accept(&movie_model(), &column, &raw).unwrap();
        let genres = update.model.node("Movie").unwrap().property("genres").unwrap();
        assert_eq!(
            genres.preparation,
            vec![Preparation::Split {
                delimiter: "|".to_string()
            }]
        );
        assert!(genres.description.contains("split on '|'"));
    }

    #[test]
    fn test_accept_rejects_malformed() {
        let column = ColumnDescriptor::new("title", "string", vec![]);
        let result = builder().accept(&movie_model(), &column, "{\"nodes\": \"Movie\"}");
        assert!(matches!(
            result,
            Err(PipelineError::MalformedOutput {
                stage: Stage::ModelBuilder,
                ..
            })
        ));
    }

    #[test]
    fn test_reject_policy_surfaces_conflict() {
        let strict = ModelBuilder::new(ConflictPolicy::Reject).unwrap();
        let column = ColumnDescriptor::new("title", "string", vec![]);
        let raw = json!({
            "nodes": [{
                "label": "Movie",
                "description": "A stage play",
                "properties": [
                    {"key": "title", "type": "STRING", "description": "Movie title", "unique": true}
                ]
            }],
            "relationships": []
        })
        .to_string();

        let result = strict.accept(&movie_model(), &column, &raw);
        assert!(matches!(result, Err(PipelineError::MergeConflict { .. })));
    }
}
