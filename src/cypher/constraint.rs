//! Uniqueness constraints.
//!
//! Every constraint is conditional so re-declaring it across entity
//! statements and repeated runs is harmless:
//!
//! ```text
//! CREATE CONSTRAINT movie_title_id IF NOT EXISTS FOR (m:Movie) REQUIRE m.title IS UNIQUE
//! ```

use crate::cypher::keys::merge_keys;
use crate::cypher::text::{identifier, split_statements, strip_literals, unquote};
use crate::rules::naming::split_words;
use crate::types::{ConstraintStatement, ConstraintTarget, CypherStatement, PipelineError, Result, Stage};
use regex::Regex;
use std::sync::OnceLock;

fn target_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:FOR|ON)\s*\(\s*(?P<var>\w+)\s*:\s*(?P<label>`[^`]+`|\w+)\s*\)\s*(?:REQUIRE|ASSERT)\s*\(?\s*(?P<pvar>\w+)\s*\.\s*(?P<prop>`[^`]+`|\w+)\s*\)?\s*IS\s+(?:UNIQUE|NODE\s+KEY)",
        )
        .expect("static regex")
    })
}

fn if_not_exists_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bIF\s+NOT\s+EXISTS\b").expect("static regex"))
}

fn snake(name: &str) -> String {
    split_words(name)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Constraint name for a target: `movie_title_id`.
pub fn constraint_name(target: &ConstraintTarget) -> String {
    format!("{}_{}_id", snake(&target.label), snake(&target.property))
}

/// Render the uniqueness constraint for one label/property.
pub fn render_constraint(target: &ConstraintTarget) -> ConstraintStatement {
    let var = target
        .label
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map_or('n', |c| c.to_ascii_lowercase());
    let text = format!(
        "CREATE CONSTRAINT {} IF NOT EXISTS FOR ({}:{}) REQUIRE {}.{} IS UNIQUE",
        constraint_name(target),
        var,
        identifier(&target.label),
        var,
        identifier(&target.property)
    );
    ConstraintStatement {
        text,
        target: Some(target.clone()),
    }
}

/// Constraints for every merge/match key of an import statement.
///
/// A statement without keys yields no constraints.
pub fn derive_constraints(statement: &CypherStatement) -> Vec<ConstraintStatement> {
    merge_keys(&statement.text)
        .iter()
        .map(render_constraint)
        .collect()
}

/// Parse one constraint statement.
///
/// # Errors
///
/// Returns `PipelineError::MalformedOutput` if the statement is not a
/// conditional `CREATE CONSTRAINT`
pub fn parse_constraint(text: &str) -> Result<ConstraintStatement> {
    let text = text.trim().trim_end_matches(';').trim();
    let bare = strip_literals(text);

    if !bare.to_uppercase().starts_with("CREATE CONSTRAINT") {
        return Err(PipelineError::malformed(
            Stage::Constraint,
            format!("not a constraint declaration: '{}'", text),
        ));
    }
    if !if_not_exists_regex().is_match(&bare) {
        return Err(PipelineError::malformed(
            Stage::Constraint,
            format!("constraint is not guarded by IF NOT EXISTS: '{}'", text),
        ));
    }

    let target = target_regex()
        .captures(&bare)
        .filter(|caps| caps["var"] == caps["pvar"])
        .map(|caps| ConstraintTarget::new(unquote(&caps["label"]), unquote(&caps["prop"])));

    Ok(ConstraintStatement {
        text: text.to_string(),
        target,
    })
}

/// Split a raw `;`-joined constraint response into statements.
///
/// Segments are trimmed and empty ones discarded; the result is exactly
/// the set of statements to execute.
///
/// # Errors
///
/// Returns `PipelineError::MalformedOutput` if any segment is not a
/// conditional constraint declaration
pub fn split_constraints(raw: &str) -> Result<Vec<ConstraintStatement>> {
    split_statements(raw)
        .iter()
        .map(|segment| parse_constraint(segment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityRef;

    #[test]
    fn test_render_constraint() {
        let stmt = render_constraint(&ConstraintTarget::new("Movie", "title"));
        assert_eq!(
            stmt.text,
            "CREATE CONSTRAINT movie_title_id IF NOT EXISTS FOR (m:Movie) REQUIRE m.title IS UNIQUE"
        );
        assert_eq!(
            constraint_name(&ConstraintTarget::new("MovieGenre", "releaseYear")),
            "movie_genre_release_year_id"
        );
    }

    #[test]
    fn test_derive_from_person_statement() {
        let stmt = CypherStatement::new(
            EntityRef::node("Person"),
            "UNWIND $rows AS row MERGE (p:Person {id: row.`person_id`}) SET p.name = row.`name`",
        );
        let constraints = derive_constraints(&stmt);
        assert_eq!(constraints.len(), 1);
        assert_eq!(
            constraints[0].target,
            Some(ConstraintTarget::new("Person", "id"))
        );
    }

    #[test]
    fn test_split_constraints() {
        let raw = "CREATE CONSTRAINT person_id_id IF NOT EXISTS FOR (p:Person) REQUIRE p.id IS UNIQUE;\n\
                   ;  \n\
                   CREATE CONSTRAINT movie_title_id IF NOT EXISTS FOR (m:Movie) REQUIRE (m.title) IS UNIQUE;";
        let constraints = split_constraints(raw).unwrap();
        assert_eq!(constraints.len(), 2);
        assert_eq!(
            constraints[1].target,
            Some(ConstraintTarget::new("Movie", "title"))
        );
        assert!(split_constraints("  ;  ").unwrap().is_empty());
    }

    #[test]
    fn test_unguarded_constraint_is_malformed() {
        let err = split_constraints("CREATE CONSTRAINT FOR (m:Movie) REQUIRE m.title IS UNIQUE")
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedOutput { .. }));
        assert!(parse_constraint("MATCH (n) RETURN n").is_err());
    }
}
