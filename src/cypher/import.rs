//! Deterministic import statements.
//!
//! One statement per entity, iterating the bulk `$rows` parameter:
//!
//! ```text
//! UNWIND $rows AS row
//! WITH row WHERE row.`title` IS NOT NULL
//! MERGE (n:Movie {title: row.`title`})
//! SET n.released = toInteger(row.`released`)
//! ```
//!
//! Nodes merge on their unique property only and set everything else.
//! Relationships match both endpoint nodes on their unique properties and
//! merge the relationship between them. A relationship from a label to
//! itself reads the end node's key from its own column: the relationship
//! declares a property named like the end node's key, mapped to that
//! column (`KNOWS {id <- friend_id}` for `(:Person {id <- person_id})`).

use crate::cypher::expr::{is_list_valued, split_expression, value_expression};
use crate::cypher::text::identifier;
use crate::types::{
    CypherStatement, DataModel, EntityRef, NodeDef, PipelineError, PropertyDef, RelationshipDef,
    Result,
};
use serde_json::{json, Map, Value};

/// Name of the bulk parameter every import statement iterates.
pub const ROWS_PARAMETER: &str = "rows";

fn key_of<'a>(node: &'a NodeDef) -> Result<&'a PropertyDef> {
    node.key_property().ok_or_else(|| {
        PipelineError::validation(format!(
            "Node {} declares no unique property to merge on",
            node.label
        ))
    })
}

fn set_clause(var: &str, props: &[&PropertyDef]) -> Option<String> {
    if props.is_empty() {
        return None;
    }
    let assignments: Vec<String> = props
        .iter()
        .map(|p| format!("{}.{} = {}", var, identifier(&p.key), value_expression(p)))
        .collect();
    Some(format!("SET {}", assignments.join(",\n    ")))
}

/// Lines binding `{var}Key` (or an inline expression) for a node's key.
///
/// `bound` lists the variables in scope, carried through the null guard.
///
/// # Returns
///
/// `(preamble lines, key expression)`
fn bind_key(var: &str, key: &PropertyDef, bound: &[&str]) -> (Vec<String>, String) {
    if is_list_valued(key) {
        let column = key.column_name.as_deref().unwrap_or(&key.key);
        let delimiter = key.split_delimiter().unwrap_or(",");
        let alias = format!("{}Key", var);
        return (
            vec![format!(
                "UNWIND {} AS {}",
                split_expression(column, delimiter, &key.preparation),
                alias
            )],
            alias,
        );
    }

    let expr = value_expression(key);
    if key.composite_of.is_empty() {
        let guard = format!("WITH {} WHERE {} IS NOT NULL", bound.join(", "), expr);
        (vec![guard], expr)
    } else {
        (Vec::new(), expr)
    }
}

fn render_node(node: &NodeDef) -> Result<String> {
    let key = key_of(node)?;
    let mut lines = vec![format!("UNWIND ${} AS row", ROWS_PARAMETER)];

    let (preamble, key_expr) = bind_key("n", key, &["row"]);
    lines.extend(preamble);
    lines.push(format!(
        "MERGE (n:{} {{{}: {}}})",
        identifier(&node.label),
        identifier(&key.key),
        key_expr
    ));

    let others: Vec<&PropertyDef> = node.properties.iter().filter(|p| p.key != key.key).collect();
    lines.extend(set_clause("n", &others));
    Ok(lines.join("\n"))
}

/// End-side key of a self-relationship: the node key read from the
/// column of the relationship property that shares its name.
fn self_relationship_key(rel: &RelationshipDef, node_key: &PropertyDef) -> Result<PropertyDef> {
    let column = rel
        .properties
        .iter()
        .find(|p| p.key == node_key.key)
        .and_then(|p| p.column_name.as_deref())
        .filter(|column| node_key.composite_of.is_empty() && !node_key.source_columns().contains(column))
        .ok_or_else(|| {
            PipelineError::validation(format!(
                "Relationship {} connects {} to itself; declare a relationship property '{}' \
                 mapped to the column holding the end node's key",
                rel.rel_type, rel.start_label, node_key.key
            ))
        })?;

    let mut key = node_key.clone();
    key.column_name = Some(column.to_string());
    Ok(key)
}

fn render_relationship(model: &DataModel, rel: &RelationshipDef) -> Result<String> {
    let endpoint = |label: &str| {
        model
            .node(label)
            .ok_or_else(|| PipelineError::UnknownEntity(format!("(:{})", label)))
    };
    let start = endpoint(&rel.start_label)?;
    let end = endpoint(&rel.end_label)?;
    let start_key = key_of(start)?;

    let self_key;
    let end_key = if rel.start_label == rel.end_label {
        self_key = self_relationship_key(rel, start_key)?;
        &self_key
    } else {
        key_of(end)?
    };

    let mut lines = vec![format!("UNWIND ${} AS row", ROWS_PARAMETER)];

    let (preamble, start_expr) = bind_key("source", start_key, &["row"]);
    lines.extend(preamble);
    lines.push(format!(
        "MATCH (source:{} {{{}: {}}})",
        identifier(&start.label),
        identifier(&start_key.key),
        start_expr
    ));

    let (preamble, end_expr) = bind_key("target", end_key, &["row", "source"]);
    lines.extend(preamble);
    lines.push(format!(
        "MATCH (target:{} {{{}: {}}})",
        identifier(&end.label),
        identifier(&end_key.key),
        end_expr
    ));

    lines.push(format!(
        "MERGE (source)-[r:{}]->(target)",
        identifier(&rel.rel_type)
    ));
    let props: Vec<&PropertyDef> = rel
        .properties
        .iter()
        .filter(|p| rel.start_label != rel.end_label || p.key != end_key.key)
        .collect();
    lines.extend(set_clause("r", &props));
    Ok(lines.join("\n"))
}

/// Render the import statement for one entity of the model.
///
/// # Arguments
///
/// * `model` - Finalized data model
/// * `entity` - Entity to import
///
/// # Returns
///
/// Statement iterating `$rows`
///
/// # Errors
///
/// Returns `PipelineError::UnknownEntity` if the entity (or a relationship
/// endpoint) is not in the model, `PipelineError::ValidationError` if a
/// node has no unique property or a self-relationship does not name the
/// column of its end node's key
pub fn render_import(model: &DataModel, entity: &EntityRef) -> Result<CypherStatement> {
    let text = match entity {
        EntityRef::Node { label } => {
            let node = model
                .node(label)
                .ok_or_else(|| PipelineError::UnknownEntity(entity.to_string()))?;
            render_node(node)?
        }
        EntityRef::Relationship {
            rel_type,
            start,
            end,
        } => {
            let rel = model
                .relationship(rel_type, start, end)
                .ok_or_else(|| PipelineError::UnknownEntity(entity.to_string()))?;
            render_relationship(model, rel)?
        }
    };
    Ok(CypherStatement::new(entity.clone(), text))
}

/// Group rows into `{"rows": [...]}` parameter maps of at most `batch_size` rows.
///
/// Executing the batches is the caller's business; every import statement
/// takes exactly this parameter shape.
pub fn row_batches(rows: &[Map<String, Value>], batch_size: usize) -> Vec<Value> {
    let size = batch_size.max(1);
    rows.chunks(size)
        .map(|chunk| json!({ ROWS_PARAMETER: chunk }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Preparation, PropertyType};

    fn movies() -> DataModel {
        DataModel {
            nodes: vec![
                NodeDef::new(
                    "Movie",
                    vec![
                        PropertyDef::new("title", PropertyType::String).unique(),
                        PropertyDef::new("released", PropertyType::Integer).with_preparation(
                            Preparation::Cast {
                                to: PropertyType::Integer,
                            },
                        ),
                    ],
                ),
                NodeDef::new(
                    "Person",
                    vec![PropertyDef::new("id", PropertyType::String)
                        .with_column("person_id")
                        .unique()],
                ),
                NodeDef::new(
                    "Genre",
                    vec![PropertyDef::new("name", PropertyType::String)
                        .with_column("genres")
                        .with_preparation(Preparation::Split {
                            delimiter: "|".into(),
                        })
                        .unique()],
                ),
            ],
            relationships: vec![
                RelationshipDef::new(
                    "ACTED_IN",
                    "Person",
                    "Movie",
                    vec![PropertyDef::new("role", PropertyType::String)],
                ),
                RelationshipDef::new("IN_GENRE", "Movie", "Genre", vec![]),
            ],
        }
    }

    #[test]
    fn test_node_merges_on_key_only() {
        let stmt = render_import(&movies(), &EntityRef::node("Movie")).unwrap();
        assert_eq!(
            stmt.text,
            "UNWIND $rows AS row\n\
             WITH row WHERE row.`title` IS NOT NULL\n\
             MERGE (n:Movie {title: row.`title`})\n\
             SET n.released = toInteger(row.`released`)"
        );
    }

    #[test]
    fn test_split_key_unwinds() {
        let stmt = render_import(&movies(), &EntityRef::node("Genre")).unwrap();
        assert!(stmt.text.contains(
            "UNWIND [item IN split(trim(toString(row.`genres`)), '|') WHERE trim(item) <> '' | trim(item)] AS nKey"
        ));
        assert!(stmt.text.contains("MERGE (n:Genre {name: nKey})"));
        assert!(!stmt.text.contains("SET"));
    }

    #[test]
    fn test_relationship_matches_endpoints() {
        let entity = EntityRef::relationship("ACTED_IN", "Person", "Movie");
        let stmt = render_import(&movies(), &entity).unwrap();
        assert!(stmt.text.contains("MATCH (source:Person {id: row.`person_id`})"));
        assert!(stmt.text.contains("WITH row, source WHERE row.`title` IS NOT NULL"));
        assert!(stmt.text.contains("MATCH (target:Movie {title: row.`title`})"));
        assert!(stmt.text.contains("MERGE (source)-[r:ACTED_IN]->(target)"));
        assert!(stmt.text.ends_with("SET r.role = row.`role`"));
    }

    #[test]
    fn test_self_relationship_reads_end_key_column() {
        let mut model = movies();
        model.relationships.push(RelationshipDef::new(
            "KNOWS",
            "Person",
            "Person",
            vec![
                PropertyDef::new("id", PropertyType::String).with_column("friend_id"),
                PropertyDef::new("since", PropertyType::Integer),
            ],
        ));

        let entity = EntityRef::relationship("KNOWS", "Person", "Person");
        let stmt = render_import(&model, &entity).unwrap();
        assert!(stmt.text.contains("MATCH (source:Person {id: row.`person_id`})"));
        assert!(stmt.text.contains("WITH row, source WHERE row.`friend_id` IS NOT NULL"));
        assert!(stmt.text.contains("MATCH (target:Person {id: row.`friend_id`})"));
        assert!(stmt.text.contains("MERGE (source)-[r:KNOWS]->(target)"));
        assert!(stmt.text.ends_with("SET r.since = row.`since`"));
        assert!(!stmt.text.contains("r.id"));
        assert!(crate::cypher::lint_import_statement(&stmt, &model).is_empty());
    }

    #[test]
    fn test_self_relationship_without_end_column() {
        let mut model = movies();
        model.relationships.push(RelationshipDef::new("KNOWS", "Person", "Person", vec![]));
        let entity = EntityRef::relationship("KNOWS", "Person", "Person");
        match render_import(&model, &entity) {
            Err(PipelineError::ValidationError(msg)) => assert!(msg.contains("'id'")),
            other => panic!("expected validation error, got {:?}", other),
        }

        // Reading the start node's own column would only produce loops
        model.relationships[2].properties =
            vec![PropertyDef::new("id", PropertyType::String).with_column("person_id")];
        assert!(render_import(&model, &entity).is_err());
    }

    #[test]
    fn test_errors() {
        let mut model = movies();
        assert!(matches!(
            render_import(&model, &EntityRef::node("Studio")),
            Err(PipelineError::UnknownEntity(_))
        ));

        model.nodes[0].properties[0].unique = false;
        assert!(render_import(&model, &EntityRef::node("Movie")).is_err());
    }

    #[test]
    fn test_row_batches() {
        let row: Map<String, Value> = serde_json::from_value(json!({"title": "Heat"})).unwrap();
        let batches = row_batches(&vec![row; 5], 2);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2]["rows"].as_array().unwrap().len(), 1);
    }
}
