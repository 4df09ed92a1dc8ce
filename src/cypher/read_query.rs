//! Read query validation against a graph schema.

use crate::cypher::pattern::{
    clauses, map_projections, node_patterns, procedure_calls, property_accesses, rel_patterns,
    split_top_level,
};
use crate::cypher::text::{split_statements, strip_literals, unquote};
use crate::schema::GraphSchema;
use crate::types::{PipelineError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const WRITE_CLAUSES: [&str; 11] = [
    "CREATE",
    "MERGE",
    "SET",
    "DELETE",
    "DETACH DELETE",
    "REMOVE",
    "DROP",
    "FOREACH",
    "LOAD CSV",
    "ON CREATE",
    "ON MATCH",
];

/// Procedure namespaces that write to the graph or run arbitrary Cypher.
const WRITE_PROCEDURE_PREFIXES: [&str; 11] = [
    "apoc.create.",
    "apoc.merge.",
    "apoc.refactor.",
    "apoc.periodic.",
    "apoc.cypher.doit",
    "apoc.cypher.run",
    "apoc.nodes.delete",
    "apoc.atomic.",
    "apoc.do.",
    "db.create",
    "dbms.",
];

fn read_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:MATCH|OPTIONAL\s+MATCH|WITH|UNWIND|RETURN|CALL)\b").expect("static regex")
    })
}

fn alias_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?P<var>[A-Za-z_]\w*)\.(?P<prop>`[^`]+`|\w+)\s+AS\s+(?P<alias>`[^`]+`|\w+)")
            .expect("static regex")
    })
}

fn order_direction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:ASC|ASCENDING|DESC|DESCENDING)\s*$").expect("static regex"))
}

fn property_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<var>[A-Za-z_]\w*)\s*\.\s*(?P<prop>`[^`]+`|\w+)$").expect("static regex")
    })
}

/// Whether `var.prop IS NOT NULL` appears in `text` before byte `before`.
fn has_null_filter(text: &str, var: &str, prop: &str, before: usize) -> bool {
    let pattern = format!(
        r"(?i)\b{}\s*\.\s*`?{}`?\s+IS\s+NOT\s+NULL\b",
        regex::escape(var),
        regex::escape(prop)
    );
    let head = text.get(..before).unwrap_or(text);
    Regex::new(&pattern).map(|re| re.is_match(head)).unwrap_or(false)
}

fn is_write_procedure(name: &str) -> bool {
    let name = name.to_lowercase();
    WRITE_PROCEDURE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

#[derive(Default)]
struct Bindings {
    nodes: HashMap<String, Vec<String>>,
    relationships: HashMap<String, Vec<String>>,
}

fn push_unique(violations: &mut Vec<String>, message: String) {
    if !violations.contains(&message) {
        violations.push(message);
    }
}

fn check_schema_references(text: &str, schema: &GraphSchema, violations: &mut Vec<String>) {
    let mut bindings = Bindings::default();

    for node in node_patterns(text) {
        for label in &node.labels {
            if !schema.has_label(label) {
                push_unique(violations, format!("label '{}' is not in the schema", label));
            }
        }
        if node.labels.is_empty() {
            continue;
        }
        for (key, _) in &node.properties {
            if !node.labels.iter().any(|l| schema.label_has_property(l, key)) {
                push_unique(
                    violations,
                    format!("{} has no property '{}'", node.labels.join(":"), key),
                );
            }
        }
        if let Some(var) = node.var {
            bindings.nodes.insert(var, node.labels);
        }
    }

    for rel in rel_patterns(text) {
        for rel_type in &rel.types {
            if !schema.has_relationship_type(rel_type) {
                push_unique(
                    violations,
                    format!("relationship type '{}' is not in the schema", rel_type),
                );
            }
        }
        if rel.types.is_empty() {
            continue;
        }
        for (key, _) in &rel.properties {
            if !rel.types.iter().any(|t| schema.relationship_has_property(t, key)) {
                push_unique(
                    violations,
                    format!("{} has no property '{}'", rel.types.join("|"), key),
                );
            }
        }
        if let Some(var) = rel.var {
            bindings.relationships.insert(var, rel.types);
        }
    }

    for (var, prop) in property_accesses(text).into_iter().chain(map_projections(text)) {
        if let Some(labels) = bindings.nodes.get(&var) {
            if !labels.iter().any(|l| schema.label_has_property(l, &prop)) {
                push_unique(
                    violations,
                    format!("{} has no property '{}' ({}.{})", labels.join(":"), prop, var, prop),
                );
            }
        } else if let Some(types) = bindings.relationships.get(&var) {
            if !types.iter().any(|t| schema.relationship_has_property(t, &prop)) {
                push_unique(
                    violations,
                    format!("{} has no property '{}' ({}.{})", types.join("|"), prop, var, prop),
                );
            }
        }
    }
}

fn check_ordering(text: &str, violations: &mut Vec<String>) {
    let aliases: HashMap<String, (String, String)> = alias_regex()
        .captures_iter(text)
        .map(|caps| {
            (
                unquote(&caps["alias"]),
                (caps["var"].to_string(), unquote(&caps["prop"])),
            )
        })
        .collect();

    for clause in clauses(text).iter().filter(|c| c.keyword == "ORDER BY") {
        for item in split_top_level(clause.body, ',') {
            let item = order_direction_regex().replace(item.trim(), "");
            let item = item.trim();
            let target = match property_path_regex().captures(item) {
                Some(caps) => Some((caps["var"].to_string(), unquote(&caps["prop"]))),
                None => aliases.get(&unquote(item)).cloned(),
            };
            if let Some((var, prop)) = target {
                if !has_null_filter(text, &var, &prop, clause.start) {
                    push_unique(
                        violations,
                        format!(
                            "ORDER BY {}.{} requires filtering {}.{} IS NOT NULL first",
                            var, prop, var, prop
                        ),
                    );
                }
            }
        }
    }
}

/// Validate a generated read query against the schema it must stay within.
///
/// # Arguments
///
/// * `query` - Generated query (markdown already stripped)
/// * `schema` - Schema snapshot of the question
///
/// # Returns
///
/// Violations: write clauses, write procedures, out-of-schema labels, relationship types or
/// properties (accessed directly or through a map projection), and
/// ordering on a property with no `IS NOT NULL` filter ahead of the
/// `ORDER BY`. Empty when the query complies.
///
/// # Errors
///
/// Returns `PipelineError::QueryRefused` if the output is not a single
/// statement starting with a read clause (commentary, apology or refusal)
pub fn validate_read_query(query: &str, schema: &GraphSchema) -> Result<Vec<String>> {
    let statements = split_statements(query);
    let statement = match statements.as_slice() {
        [single] => single,
        [] => return Err(PipelineError::QueryRefused("empty response".to_string())),
        _ => {
            return Err(PipelineError::QueryRefused(format!(
                "expected one statement, got {}",
                statements.len()
            )))
        }
    };

    let text = strip_literals(statement);
    if !read_start_regex().is_match(&text) {
        let preview: String = statement.chars().take(120).collect();
        return Err(PipelineError::QueryRefused(preview));
    }

    let mut violations = Vec::new();
    for clause in clauses(&text) {
        if WRITE_CLAUSES.contains(&clause.keyword.as_str()) {
            push_unique(
                &mut violations,
                format!("write clause {} is not allowed in a read query", clause.keyword),
            );
        }
    }

    for procedure in procedure_calls(&text) {
        if is_write_procedure(&procedure) {
            push_unique(
                &mut violations,
                format!("procedure {} writes to the graph and is not allowed in a read query", procedure),
            );
        }
    }

    check_schema_references(&text, schema, &mut violations);
    check_ordering(&text, &mut violations);
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> GraphSchema {
        GraphSchema::parse(
            "Node properties:
Movie {title: STRING, released: INTEGER}
Person {name: STRING}
Relationship properties:
ACTED_IN {role: STRING}
The relationships:
(:Person)-[:ACTED_IN]->(:Movie)",
        )
        .unwrap()
    }

    #[test]
    fn test_valid_query() {
        let query = "MATCH (m:Movie {title: 'Top Gun'})<-[r:ACTED_IN]-(p:Person)
WHERE m.released IS NOT NULL
RETURN m.title AS movie_title, m.released AS movie_released, collect(p.name + ' as ' + r.role) AS movie_cast
ORDER BY movie_released DESC";
        assert!(validate_read_query(query, &schema()).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_schema_property() {
        let query = "MATCH (m:Movie {title: 'Top Gun'}) RETURN m.genre AS movie_genre";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("genre"));

        let query = "MATCH (m:Movie)-[:IN_GENRE]->(g:Genre) RETURN g.name";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_ordering_requires_null_filter() {
        let query = "MATCH (m:Movie) RETURN m.title AS movie_title ORDER BY m.released";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(
            violations,
            vec!["ORDER BY m.released requires filtering m.released IS NOT NULL first".to_string()]
        );
    }

    #[test]
    fn test_write_clause() {
        let violations = validate_read_query("MATCH (m:Movie) SET m.title = 'x'", &schema()).unwrap();
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_refusal() {
        let err = validate_read_query("I'm sorry, I can only answer questions about movies.", &schema());
        assert!(matches!(err, Err(PipelineError::QueryRefused(_))));
        let err = validate_read_query("MATCH (n) RETURN n; MATCH (m) DETACH DELETE m", &schema());
        assert!(matches!(err, Err(PipelineError::QueryRefused(_))));
    }

    #[test]
    fn test_map_projection_out_of_schema() {
        let query = "MATCH (m:Movie {title: 'Top Gun'}) RETURN m {.title, .genre} AS movie";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(violations, vec!["Movie has no property 'genre' (m.genre)".to_string()]);

        let query = "MATCH (m:Movie {title: 'Top Gun'})<-[r:ACTED_IN]-(p:Person)
RETURN m {.title, .released, cast: collect(p {.name, .age, role: r.role})} AS movie";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(violations, vec!["Person has no property 'age' (p.age)".to_string()]);
    }

    #[test]
    fn test_write_procedure() {
        let query = "MATCH (m:Movie {title: 'Top Gun'}) CALL apoc.refactor.setType(m, 'X') YIELD output RETURN m.title AS movie_title";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(
            violations,
            vec!["procedure apoc.refactor.setType writes to the graph and is not allowed in a read query".to_string()]
        );

        let query = "CALL db.labels() YIELD label RETURN label";
        assert!(validate_read_query(query, &schema()).unwrap().is_empty());
    }

    #[test]
    fn test_null_filter_must_precede_ordering() {
        let query = "MATCH (m:Movie) WITH m ORDER BY m.released WHERE m.released IS NOT NULL RETURN m.title AS movie_title";
        let violations = validate_read_query(query, &schema()).unwrap();
        assert_eq!(
            violations,
            vec!["ORDER BY m.released requires filtering m.released IS NOT NULL first".to_string()]
        );

        let query = "MATCH (m:Movie) WHERE m.released IS NOT NULL WITH m ORDER BY m.released RETURN m.title AS movie_title";
        assert!(validate_read_query(query, &schema()).unwrap().is_empty());
    }
}
