//! Pipeline orchestration.
//!
//! Stages run strictly in sequence:
//!
//! ```text
//! columns ──► ModelBuilder (once per column) ──► DataModel
//! DataModel ──► ImportBuilder (once per entity) ──► CypherStatement
//! CypherStatement ──► ConstraintBuilder ──► ConstraintStatement*
//! QueryRequest ──► QueryBuilder (once per question) ──► QueryResponse
//! ```
//!
//! The data model is threaded through as a value; the pipeline itself only
//! holds configuration and the running token usage.

use crate::agents::{AggregatedTokenUsage, CompletionProvider, LlmClient, PromptBudget};
use crate::config::PipelineConfig;
use crate::llm::{ConstraintBuilder, ImportBuilder, LlmInvoker, ModelBuilder, ModelUpdate, QueryBuilder};
use crate::telemetry::{record_stage_metrics, stage_span};
use crate::types::{
    ColumnDescriptor, ConstraintStatement, CypherStatement, DataModel, EntityRef, PipelineError,
    QueryRequest, QueryResponse, Result, Stage,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Import statements and constraints for a finalized model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPlan {
    /// One statement per entity, nodes first
    pub statements: Vec<CypherStatement>,

    /// Constraints across all statements, de-duplicated by text
    pub constraints: Vec<ConstraintStatement>,

    /// Token usage of the pipeline run up to the end of planning
    pub usage: AggregatedTokenUsage,

    /// When planning finished
    pub generated_at: DateTime<Utc>,
}

impl ImportPlan {
    /// Statement for one entity.
    pub fn statement(&self, entity: &EntityRef) -> Option<&CypherStatement> {
        self.statements.iter().find(|s| &s.entity == entity)
    }

    /// Render as a `;`-terminated script, constraints first.
    ///
    /// Import statements still expect the `$rows` parameter; the script is
    /// for review and for drivers that bind parameters per statement.
    pub fn to_script(&self) -> String {
        let mut parts: Vec<String> = self
            .constraints
            .iter()
            .map(|c| format!("{};", c.text))
            .collect();
        parts.extend(
            self.statements
                .iter()
                .map(|s| format!("// {}\n{};", s.entity, s.text)),
        );
        parts.join("\n\n")
    }
}

/// CSV-to-graph pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    llm: LlmInvoker,
    model_builder: ModelBuilder,
    import_builder: ImportBuilder,
    constraint_builder: ConstraintBuilder,
    query_builder: QueryBuilder,
}

impl Pipeline {
    /// Create a pipeline talking to the configured LLM API.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if the API key is missing
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let client = LlmClient::new(&config.llm)?;
        Self::with_provider(Arc::new(client), config)
    }

    /// Create a pipeline from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if a variable is invalid or the
    /// API key is missing
    pub fn from_env() -> Result<Self> {
        Self::from_config(PipelineConfig::from_env()?)
    }

    /// Create a pipeline over any completion provider.
    ///
    /// # Arguments
    ///
    /// * `provider` - Completion provider
    /// * `config` - Stage, merge and budget settings (`llm.model` is
    ///   ignored in favour of the provider's model)
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` if a built-in output schema
    /// does not compile
    pub fn with_provider(provider: Arc<dyn CompletionProvider>, config: PipelineConfig) -> Result<Self> {
        let budget = PromptBudget::new(
            provider.model(),
            config.llm.context_window,
            config.llm.max_tokens as usize,
        );

        Ok(Self {
            llm: LlmInvoker::new(provider, budget),
            model_builder: ModelBuilder::new(config.merge.policy)?,
            import_builder: ImportBuilder::new(config.generation.import_mode, config.generation.strict),
            constraint_builder: ConstraintBuilder::new(config.generation.constraint_mode)?,
            query_builder: QueryBuilder::new(config.generation.strict),
            config,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token usage across every request so far.
    pub fn usage(&self) -> AggregatedTokenUsage {
        self.llm.usage()
    }

    /// Fit one column into the model.
    ///
    /// # Arguments
    ///
    /// * `existing` - Model so far (empty for the first column)
    /// * `column` - Column to place
    ///
    /// # Returns
    ///
    /// `ModelUpdate` whose model extends `existing`
    ///
    /// # Errors
    ///
    /// See [`ModelBuilder::accept`]
    pub async fn build_model(&self, existing: &DataModel, column: &ColumnDescriptor) -> Result<ModelUpdate> {
        let span = stage_span(Stage::ModelBuilder, &column.key);
        let result = self
            .model_builder
            .build(&self.llm, existing, column)
            .instrument(span.clone())
            .await;

        match &result {
            Ok(update) => record_stage_metrics(&span, Some(update.added.len()), "success"),
            Err(_) => record_stage_metrics(&span, None, "failed"),
        }
        result
    }

    /// Build a model from a sequence of columns, one pass per column.
    ///
    /// # Errors
    ///
    /// Stops at the first failing column
    pub async fn build_model_from(&self, columns: &[ColumnDescriptor]) -> Result<DataModel> {
        let mut model = DataModel::new();
        for column in columns {
            model = self.build_model(&model, column).await?.model;
        }

        tracing::info!(
            columns = columns.len(),
            nodes = model.nodes.len(),
            relationships = model.relationships.len(),
            properties = model.property_count(),
            "Data model complete"
        );
        Ok(model)
    }

    /// Generate the import statement for one entity.
    ///
    /// # Errors
    ///
    /// See [`ImportBuilder::generate`]
    pub async fn import_statement(&self, model: &DataModel, entity: &EntityRef) -> Result<CypherStatement> {
        let span = stage_span(Stage::ImportStatement, &entity.to_string());
        let result = self
            .import_builder
            .generate(&self.llm, model, entity)
            .instrument(span.clone())
            .await;

        record_stage_metrics(&span, Some(1), if result.is_ok() { "success" } else { "failed" });
        result
    }

    /// Generate the constraints for one import statement.
    ///
    /// # Errors
    ///
    /// See [`ConstraintBuilder::generate`]
    pub async fn constraints(&self, statement: &CypherStatement) -> Result<Vec<ConstraintStatement>> {
        let span = stage_span(Stage::Constraint, &statement.entity.to_string());
        let result = self
            .constraint_builder
            .generate(&self.llm, statement)
            .instrument(span.clone())
            .await;

        match &result {
            Ok(constraints) => record_stage_metrics(&span, Some(constraints.len()), "success"),
            Err(_) => record_stage_metrics(&span, None, "failed"),
        }
        result
    }

    /// Generate import statements and constraints for a finalized model.
    ///
    /// The import stage runs exactly once per entity (nodes before
    /// relationships) and the constraint stage once per statement.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` for an empty model; stops
    /// at the first failing entity otherwise
    pub async fn plan_import(&self, model: &DataModel) -> Result<ImportPlan> {
        if model.is_empty() {
            return Err(PipelineError::validation("Data model is empty; nothing to import"));
        }
        for node in model.nodes.iter().filter(|n| n.key_property().is_none()) {
            tracing::warn!(label = %node.label, "Node has no unique property to merge on");
        }

        let entities = model.entities();
        let mut statements = Vec::with_capacity(entities.len());
        let mut constraints: Vec<ConstraintStatement> = Vec::new();

        for entity in &entities {
            let statement = self.import_statement(model, entity).await?;
            for constraint in self.constraints(&statement).await? {
                if !constraints.iter().any(|c| c.text == constraint.text) {
                    constraints.push(constraint);
                }
            }
            statements.push(statement);
        }

        tracing::info!(
            statements = statements.len(),
            constraints = constraints.len(),
            "Import plan complete"
        );

        Ok(ImportPlan {
            statements,
            constraints,
            usage: self.llm.usage(),
            generated_at: Utc::now(),
        })
    }

    /// Answer a question with one read-only query.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::build_query`]
    pub async fn ask(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let span = stage_span(Stage::Query, &request.question);
        let result = self
            .query_builder
            .build_query(&self.llm, request)
            .instrument(span.clone())
            .await;

        record_stage_metrics(&span, Some(1), if result.is_ok() { "success" } else { "failed" });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConstraintTarget, EntityRef};

    #[test]
    fn test_script_puts_constraints_first() {
        let plan = ImportPlan {
            statements: vec![CypherStatement::new(
                EntityRef::node("Movie"),
                "UNWIND $rows AS row\nMERGE (n:Movie {title: row.`title`})",
            )],
            constraints: vec![ConstraintStatement {
                text: "CREATE CONSTRAINT movie_title_id IF NOT EXISTS FOR (m:Movie) REQUIRE m.title IS UNIQUE"
                    .to_string(),
                target: Some(ConstraintTarget::new("Movie", "title")),
            }],
            usage: AggregatedTokenUsage::default(),
            generated_at: Utc::now(),
        };

        let script = plan.to_script();
        let constraint_at = script.find("CREATE CONSTRAINT").unwrap();
        let import_at = script.find("UNWIND").unwrap();
        assert!(constraint_at < import_at);
        assert!(script.contains("REQUIRE m.title IS UNIQUE;"));
        assert!(script.ends_with("MERGE (n:Movie {title: row.`title`});"));
        assert!(plan.statement(&EntityRef::node("Movie")).is_some());
        assert!(plan.statement(&EntityRef::node("Person")).is_none());
    }
}
