//! Merge/match key extraction from import statements.

use crate::cypher::pattern::{clauses, node_patterns};
use crate::cypher::text::{strip_literals, unquote};
use crate::types::ConstraintTarget;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn is_key_clause(keyword: &str) -> bool {
    matches!(keyword, "MERGE" | "MATCH" | "OPTIONAL MATCH")
}

/// Properties used to merge or match labeled nodes in a statement.
///
/// Covers property maps in `MERGE`/`MATCH` node patterns and
/// `var.prop = ...` equalities in the `WHERE` directly following a
/// `MATCH`. Unlabeled patterns contribute nothing.
///
/// # Returns
///
/// Distinct `(label, property)` targets in order of appearance
pub fn merge_keys(statement: &str) -> Vec<ConstraintTarget> {
    let text = strip_literals(statement);
    let found = clauses(&text);
    let mut targets: Vec<ConstraintTarget> = Vec::new();
    let mut push = |target: ConstraintTarget| {
        if !targets.contains(&target) {
            targets.push(target);
        }
    };

    for (i, clause) in found.iter().enumerate() {
        if !is_key_clause(&clause.keyword) {
            continue;
        }

        let mut bound: HashMap<String, String> = HashMap::new();
        for node in node_patterns(clause.body) {
            let Some(label) = node.labels.first() else {
                continue;
            };
            if let Some(var) = &node.var {
                bound.insert(var.clone(), label.clone());
            }
            for (key, _) in &node.properties {
                push(ConstraintTarget::new(label.clone(), key.clone()));
            }
        }

        let where_clause = found
            .get(i + 1)
            .filter(|next| next.keyword == "WHERE" && clause.keyword != "MERGE");
        if let Some(filter) = where_clause {
            for (var, prop) in equality_accesses(filter.body) {
                if let Some(label) = bound.get(&var) {
                    push(ConstraintTarget::new(label.clone(), prop));
                }
            }
        }
    }

    targets
}

fn equality_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?P<var>[A-Za-z_]\w*)\.(?P<prop>`[^`]+`|\w+)\s*=(?P<next>[~=]?)")
            .expect("static regex")
    })
}

/// `var.prop` accesses compared with `=` (not `=~`).
fn equality_accesses(body: &str) -> Vec<(String, String)> {
    equality_regex()
        .captures_iter(body)
        .filter(|caps| caps["next"].is_empty())
        .map(|caps| (caps["var"].to_string(), unquote(&caps["prop"])))
        .collect()
}
