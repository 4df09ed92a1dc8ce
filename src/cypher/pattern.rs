//! Clause and pattern scanning over Cypher text.
//!
//! This is not a parser. It recognizes the shapes generated statements
//! use (clause keywords, `(var:Label {key: value})` node patterns and
//! `[var:TYPE {key: value}]` relationship patterns) well enough to check
//! them against a model or schema. Callers pass text that went through
//! [`strip_literals`](crate::cypher::text::strip_literals) first.

use crate::cypher::text::unquote;
use regex::Regex;
use std::sync::OnceLock;

/// One clause: normalized keyword (`MATCH`, `OPTIONAL MATCH`, `ORDER BY`, ...) and its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause<'a> {
    pub keyword: String,
    pub body: &'a str,
    /// Byte offset of the keyword in the scanned text
    pub start: usize,
}

/// `(var:Label:Other {key: value})`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    pub var: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, String)>,
}

/// `[var:TYPE|OTHER {key: value}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelPattern {
    pub var: Option<String>,
    pub types: Vec<String>,
    pub properties: Vec<(String, String)>,
}

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(OPTIONAL\s+MATCH|MATCH|MERGE|CREATE|WITH|UNWIND|WHERE|SET|RETURN|ON\s+CREATE|ON\s+MATCH|DETACH\s+DELETE|DELETE|REMOVE|CALL|FOREACH|ORDER\s+BY|SKIP|LIMIT|YIELD|UNION|LOAD\s+CSV|DROP)\b",
        )
        .expect("static regex")
    })
}

fn node_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\(\s*(?P<var>[A-Za-z_]\w*)?\s*(?P<labels>(?::\s*(?:`[^`]+`|\w+)\s*)+)?(?P<map>\{[^}]*\})?\s*\)",
        )
        .expect("static regex")
    })
}

fn rel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[\s*(?P<var>[A-Za-z_]\w*)?\s*(?P<types>:\s*(?:`[^`]+`|\w+)(?:\s*\|\s*:?\s*(?:`[^`]+`|\w+))*)?\s*(?:\*[\d.]*)?\s*(?P<map>\{[^}]*\})?\s*\]",
        )
        .expect("static regex")
    })
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]+`|\w+").expect("static regex"))
}

fn projection_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?P<var>[A-Za-z_]\w*)\s*\{\s*\.").expect("static regex"))
}

fn procedure_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bCALL\s+(?P<name>[A-Za-z_][\w.]*)\s*\(").expect("static regex")
    })
}

fn property_access_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?P<var>[A-Za-z_]\w*)\.(?P<prop>`[^`]+`|[A-Za-z_]\w*)").expect("static regex")
    })
}

/// Split text into clauses at clause keywords.
///
/// Text before the first keyword is dropped.
pub fn clauses(text: &str) -> Vec<Clause<'_>> {
    let found: Vec<_> = clause_regex().find_iter(text).collect();
    found
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = found.get(i + 1).map_or(text.len(), |next| next.start());
            Clause {
                keyword: m
                    .as_str()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_uppercase(),
                body: text[m.end()..end].trim(),
                start: m.start(),
            }
        })
        .collect()
}

/// Split on commas that are not nested in brackets or backticks.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_backtick = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '`' => in_backtick = !in_backtick,
            '(' | '[' | '{' if !in_backtick => depth += 1,
            ')' | ']' | '}' if !in_backtick => depth -= 1,
            c if c == separator && depth == 0 && !in_backtick => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Entries of a `{key: value, ...}` map literal.
pub fn map_entries(map: &str) -> Vec<(String, String)> {
    let inner = map
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}');
    split_top_level(inner, ',')
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = unquote(key);
            if key.is_empty() {
                return None;
            }
            Some((key, value.trim().to_string()))
        })
        .collect()
}

fn names(text: &str) -> Vec<String> {
    name_regex()
        .find_iter(text)
        .map(|m| unquote(m.as_str()))
        .collect()
}

/// Node patterns in `text`.
pub fn node_patterns(text: &str) -> Vec<NodePattern> {
    node_regex()
        .captures_iter(text)
        .map(|caps| NodePattern {
            var: caps.name("var").map(|m| m.as_str().to_string()),
            labels: caps.name("labels").map_or_else(Vec::new, |m| names(m.as_str())),
            properties: caps
                .name("map")
                .map_or_else(Vec::new, |m| map_entries(m.as_str())),
        })
        .collect()
}

/// Relationship patterns in `text`.
pub fn rel_patterns(text: &str) -> Vec<RelPattern> {
    rel_regex()
        .captures_iter(text)
        .map(|caps| RelPattern {
            var: caps.name("var").map(|m| m.as_str().to_string()),
            types: caps.name("types").map_or_else(Vec::new, |m| names(m.as_str())),
            properties: caps
                .name("map")
                .map_or_else(Vec::new, |m| map_entries(m.as_str())),
        })
        .collect()
}

/// `var.property` accesses in `text`.
pub fn property_accesses(text: &str) -> Vec<(String, String)> {
    property_access_regex()
        .captures_iter(text)
        .map(|caps| (caps["var"].to_string(), unquote(&caps["prop"])))
        .collect()
}

/// Properties selected by `var {.prop, ...}` map projections in `text`.
///
/// Only `.prop` entries name a property of `var`; `key: expr` entries are
/// ordinary expressions and `.*` selects everything.
pub fn map_projections(text: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for caps in projection_regex().captures_iter(text) {
        let (Some(whole), Some(var)) = (caps.get(0), caps.name("var")) else {
            continue;
        };
        let open = whole.start() + whole.as_str().find('{').unwrap_or(0);
        let mut depth = 0i32;
        let mut close = text.len();
        for (i, c) in text[open..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = open + i;
                        break;
                    }
                }
                _ => {}
            }
        }
        let body = &text[(open + 1).min(close)..close];
        for entry in split_top_level(body, ',') {
            let entry = entry.trim();
            if let Some(prop) = entry.strip_prefix('.') {
                let prop = unquote(prop);
                if !prop.is_empty() && prop != "*" {
                    found.push((var.as_str().to_string(), prop));
                }
            }
        }
    }
    found
}

/// Names of the procedures invoked with `CALL name(...)`, as written.
pub fn procedure_calls(text: &str) -> Vec<String> {
    procedure_regex()
        .captures_iter(text)
        .map(|caps| caps["name"].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clauses() {
        let found = clauses("UNWIND $rows AS row\nOPTIONAL  match (n) order by n.x LIMIT 5");
        let keywords: Vec<&str> = found.iter().map(|c| c.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["UNWIND", "OPTIONAL MATCH", "ORDER BY", "LIMIT"]);
        assert_eq!(found[0].body, "$rows AS row");
        assert_eq!(found[0].start, 0);
        assert_eq!(found[2].start, 40);
    }

    #[test]
    fn test_node_patterns() {
        let found = node_patterns("MERGE (n:Movie {title: coalesce(row.`a`, ''), `year`: 1}) (:`Odd Label`) (m)");
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].var.as_deref(), Some("n"));
        assert_eq!(found[0].labels, vec!["Movie"]);
        assert_eq!(
            found[0].properties,
            vec![
                ("title".to_string(), "coalesce(row.`a`, '')".to_string()),
                ("year".to_string(), "1".to_string())
            ]
        );
        assert_eq!(found[1].labels, vec!["Odd Label"]);
        assert!(found[2].labels.is_empty());
    }

    #[test]
    fn test_rel_patterns() {
        let found = rel_patterns("(a)-[r:ACTED_IN|DIRECTED {role: 'x'}]->(b)<-[:KNOWS*1..2]-(c)");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].types, vec!["ACTED_IN", "DIRECTED"]);
        assert_eq!(found[0].properties[0].0, "role");
        assert_eq!(found[1].types, vec!["KNOWS"]);
    }

    #[test]
    fn test_property_accesses() {
        assert_eq!(
            property_accesses("RETURN m.title, p.`full name`"),
            vec![
                ("m".to_string(), "title".to_string()),
                ("p".to_string(), "full name".to_string())
            ]
        );
    }

    #[test]
    fn test_map_projections() {
        let found = map_projections(
            "MATCH (m:Movie {title: ''}) RETURN m {.title, .`release year`, cast: collect(p {.name}), .*} AS movie",
        );
        assert_eq!(
            found,
            vec![
                ("m".to_string(), "title".to_string()),
                ("m".to_string(), "release year".to_string()),
                ("p".to_string(), "name".to_string())
            ]
        );
        assert!(map_projections("MATCH (m:Movie {title: ''}) RETURN COUNT { (m)<-[:ACTED_IN]-() }").is_empty());
    }

    #[test]
    fn test_procedure_calls() {
        assert_eq!(
            procedure_calls("MATCH (m) CALL apoc.refactor.setType(m, '') YIELD output CALL db.labels() YIELD label CALL { RETURN 1 }"),
            vec!["apoc.refactor.setType".to_string(), "db.labels".to_string()]
        );
    }
}
