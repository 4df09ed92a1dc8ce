//! Import statement lint.
//!
//! Checks a generated statement against the generation policy for its
//! entity: bulk `$rows` iteration, key-only merges, unconditional `SET`,
//! quoted and mapped column references, string-coerced split inputs and
//! null-safe slugged composite ids.

use crate::cypher::import::ROWS_PARAMETER;
use crate::cypher::pattern::{clauses, node_patterns, rel_patterns, Clause};
use crate::cypher::text::strip_literals;
use crate::types::{CypherStatement, DataModel, EntityRef, NodeDef, PropertyDef};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn unwind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bUNWIND\s+\$(?P<param>\w+)\s+AS\s+(?P<var>\w+)").expect("static regex")
    })
}

fn forbidden_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bLOAD\s+CSV\b|\bapoc\.periodic\.iterate\b").expect("static regex")
    })
}

fn split_call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|[^.\w])split\s*\(").expect("static regex"))
}

fn coerced_split_input_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*trim\s*\(\s*toString\s*\(").expect("static regex"))
}

fn column_reference_regex(row_var: &str) -> Regex {
    // `row_var` comes from `\w+`, nothing to escape.
    Regex::new(&format!(r"\b{}\.(?P<col>`[^`]+`|\w+)", row_var))
        .unwrap_or_else(|_| Regex::new(r"\brow\.(?P<col>`[^`]+`|\w+)").expect("static regex"))
}

fn known_columns(model: &DataModel) -> BTreeSet<&str> {
    model
        .nodes
        .iter()
        .flat_map(|n| n.properties.iter())
        .chain(model.relationships.iter().flat_map(|r| r.properties.iter()))
        .flat_map(PropertyDef::source_columns)
        .collect()
}

/// Keys used in the property maps of `keyword` clauses for `label`.
///
/// `None` entries are patterns on the label without a property map.
fn pattern_keys(found: &[Clause<'_>], keywords: &[&str], label: &str) -> Vec<Option<Vec<String>>> {
    found
        .iter()
        .filter(|c| keywords.contains(&c.keyword.as_str()))
        .flat_map(|c| node_patterns(c.body))
        .filter(|p| p.labels.iter().any(|l| l == label))
        .map(|p| {
            if p.properties.is_empty() {
                None
            } else {
                Some(p.properties.into_iter().map(|(k, _)| k).collect())
            }
        })
        .collect()
}

fn check_key_use(
    found: &[Clause<'_>],
    keywords: &[&str],
    node: &NodeDef,
    required: bool,
    violations: &mut Vec<String>,
) {
    let Some(key) = node.key_property() else {
        return;
    };
    let uses = pattern_keys(found, keywords, &node.label);
    if required && uses.is_empty() {
        violations.push(format!(
            "{} is never matched on its key '{}'",
            node.label, key.key
        ));
    }
    for keys in uses.into_iter().flatten() {
        let extra: Vec<&String> = keys.iter().filter(|k| **k != key.key).collect();
        if !extra.is_empty() {
            violations.push(format!(
                "{} {} on non-key properties {:?}; only '{}' may identify it, set the rest",
                keywords.join("/"),
                node.label,
                extra,
                key.key
            ));
        }
    }
}

fn check_composite(text: &str, prop: &PropertyDef, violations: &mut Vec<String>) {
    if prop.composite_of.is_empty() {
        return;
    }
    let lowered = text.to_lowercase();
    if !lowered.contains("apoc.text.slug") || !lowered.contains("tolower") {
        violations.push(format!(
            "composite id '{}' must slug and lower-case each part",
            prop.key
        ));
    }
    for column in &prop.composite_of {
        let pattern = format!(
            r"(?i)coalesce\s*\(\s*(?:toString\s*\(\s*)?\w+\.`{}`",
            regex::escape(column)
        );
        let guarded = Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false);
        if !guarded {
            violations.push(format!(
                "composite id '{}' must default missing column `{}` with coalesce(..., '')",
                prop.key, column
            ));
        }
    }
}

/// Check an import statement against the generation policy.
///
/// # Arguments
///
/// * `statement` - Generated statement
/// * `model` - Model the statement was generated from
///
/// # Returns
///
/// Human readable violations; empty when the statement complies
pub fn lint_import_statement(statement: &CypherStatement, model: &DataModel) -> Vec<String> {
    let text = strip_literals(&statement.text);
    let found = clauses(&text);
    let mut violations = Vec::new();

    if forbidden_regex().is_match(&text) {
        violations.push(
            "statement must not load files or batch itself (LOAD CSV, apoc.periodic.iterate)"
                .to_string(),
        );
    }

    let row_var = match unwind_regex().captures(&text) {
        Some(caps) if &caps["param"] == ROWS_PARAMETER => caps["var"].to_string(),
        _ => {
            violations.push(format!(
                "statement must iterate the ${} parameter with UNWIND",
                ROWS_PARAMETER
            ));
            "row".to_string()
        }
    };

    if found
        .iter()
        .any(|c| c.keyword == "ON CREATE" || c.keyword == "ON MATCH")
    {
        violations.push("properties must be set unconditionally, not via ON CREATE/ON MATCH".to_string());
    }

    let columns = known_columns(model);
    for caps in column_reference_regex(&row_var).captures_iter(&text) {
        let raw = &caps["col"];
        match raw.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
            Some(column) => {
                if !columns.contains(column) {
                    violations.push(format!("unknown column `{}`", column));
                }
            }
            None => violations.push(format!(
                "column reference {}.{} must be backtick-quoted",
                row_var, raw
            )),
        }
    }

    for m in split_call_regex().find_iter(&text) {
        if !coerced_split_input_regex().is_match(&text[m.end()..]) {
            violations.push("split input must be coerced and trimmed: split(trim(toString(...)), ...)".to_string());
        }
    }

    match &statement.entity {
        EntityRef::Node { label } => {
            if let Some(node) = model.node(label) {
                check_key_use(&found, &["MERGE"], node, true, &mut violations);
                for prop in &node.properties {
                    check_composite(&text, prop, &mut violations);
                }
            }
        }
        EntityRef::Relationship {
            rel_type,
            start,
            end,
        } => {
            for label in [start, end] {
                if let Some(node) = model.node(label) {
                    check_key_use(&found, &["MATCH", "MERGE"], node, false, &mut violations);
                    if let Some(key) = node.key_property() {
                        check_composite(&text, key, &mut violations);
                    }
                }
            }

            let merged: Vec<_> = found
                .iter()
                .filter(|c| c.keyword == "MERGE")
                .flat_map(|c| rel_patterns(c.body))
                .filter(|r| r.types.iter().any(|t| t == rel_type))
                .collect();
            if merged.is_empty() {
                violations.push(format!("relationship {} is never merged", rel_type));
            }
            if merged.iter().any(|r| !r.properties.is_empty()) {
                violations.push(format!(
                    "MERGE on relationship {} must not match on properties; set them instead",
                    rel_type
                ));
            }
        }
    }

    violations
}
