//! Natural language to read-only Cypher query builder.

use crate::agents::CompletionRequest;
use crate::cypher::{strip_markdown, validate_read_query};
use crate::llm::LlmInvoker;
use crate::schema::GraphSchema;
use crate::types::{PipelineError, QueryRequest, QueryResponse, Result, Stage};

/// Query stage.
pub struct QueryBuilder {
    strict: bool,
}

impl QueryBuilder {
    /// Create the stage.
    ///
    /// # Arguments
    ///
    /// * `strict` - Turn schema findings into `SchemaViolation` errors
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// System prompt: query policies plus the schema snapshot.
    pub fn build_system_prompt(schema: &GraphSchema) -> String {
        format!(
            r#"Task: Generate Cypher statement to query a graph database.
Instructions:
Use only the provided relationship types and properties in the schema.
Do not use any other relationship types or properties that are not provided.
Schema:
{schema}
Note: Do not include any explanations or apologies in your responses.
Do not respond to any questions that might ask anything else than for you to construct a Cypher statement.
Do not include any text except the generated Cypher statement.

Always use verbose column names in the Cypher statement using the label and property names. For example, use 'person_name' instead of 'name'.
Include data from the immediate network around the node in the result to provide extra context. For example, include the Movie release year, a list of actors and their roles, or the director of a movie.
When ordering by a property, add an `IS NOT NULL` check to ensure that only nodes with that property are returned.

Examples: Here are a few examples of generated Cypher statements for particular questions:

# How many people acted in Top Gun?
MATCH (m:Movie {{title: "Top Gun"}})
RETURN COUNT {{ (m)<-[:ACTED_IN]-() }} AS numberOfActors"#,
            schema = schema.render()
        )
    }

    /// User prompt: the question.
    pub fn build_user_prompt(question: &str) -> String {
        format!("The question is:\n{}", question)
    }

    /// Check a raw response against the request's schema.
    ///
    /// # Errors
    ///
    /// - `PipelineError::QueryRefused` if the response is not a single read statement
    /// - `PipelineError::SchemaViolation` in strict mode when the query
    ///   steps outside the schema, writes, or orders on unguarded properties
    pub fn accept(&self, request: &QueryRequest, raw: &str) -> Result<QueryResponse> {
        let query = strip_markdown(raw);
        let violations = validate_read_query(&query, &request.schema)?;

        if !violations.is_empty() {
            if self.strict {
                return Err(PipelineError::SchemaViolation(violations));
            }
            for violation in &violations {
                tracing::warn!(violation = %violation, "Query finding");
            }
        }

        let query = query.trim().trim_end_matches(';').trim_end().to_string();
        Ok(QueryResponse { query })
    }

    /// Convert a natural language question into one read query.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` for an empty question or
    /// schema, plus any error of [`QueryBuilder::accept`] or the provider
    pub async fn build_query(&self, llm: &LlmInvoker, request: &QueryRequest) -> Result<QueryResponse> {
        if request.question.trim().is_empty() {
            return Err(PipelineError::validation("Question is empty"));
        }
        if request.schema.is_empty() {
            return Err(PipelineError::validation("Schema is empty; nothing can be queried"));
        }

        let completion = llm
            .invoke(&CompletionRequest::text(
                Stage::Query,
                Self::build_system_prompt(&request.schema),
                Self::build_user_prompt(&request.question),
            ))
            .await?;
        self.accept(request, &completion.text)
    }
}
