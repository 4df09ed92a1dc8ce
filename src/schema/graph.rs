//! Graph schema snapshot used by the query generator.
//!
//! Renders to (and parses from) the textual form that prompts carry:
//!
//! ```text
//! Node properties:
//! Movie {title: STRING, released: INTEGER}
//! Relationship properties:
//! ACTED_IN {role: STRING}
//! The relationships:
//! (:Person)-[:ACTED_IN]->(:Movie)
//! ```

use crate::types::{DataModel, PipelineError, PropertyDef, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

const NODE_HEADER: &str = "Node properties:";
const REL_HEADER: &str = "Relationship properties:";
const PATTERN_HEADER: &str = "The relationships:";

/// Property name and type as the schema reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// `(:start)-[:type]->(:end)` pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaPattern {
    pub start: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub end: String,
}

/// Labels, relationship types and patterns of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    /// Label -> properties
    #[serde(default)]
    pub node_properties: BTreeMap<String, Vec<SchemaProperty>>,

    /// Relationship type -> properties
    #[serde(default)]
    pub relationship_properties: BTreeMap<String, Vec<SchemaProperty>>,

    /// Relationship patterns
    #[serde(default)]
    pub relationships: Vec<SchemaPattern>,
}

fn schema_properties(props: &[PropertyDef]) -> Vec<SchemaProperty> {
    props
        .iter()
        .map(|p| SchemaProperty {
            name: p.key.clone(),
            data_type: p.data_type.as_str().to_string(),
        })
        .collect()
}

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^`?([A-Za-z_][A-Za-z0-9_]*)`?\s*\{(.*)\}$").expect("static regex"))
}

fn pattern_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\(:`?(\w+)`?\)-\[:`?(\w+)`?\]->\(:`?(\w+)`?\)$").expect("static regex")
    })
}

fn parse_properties(body: &str, line: &str) -> Result<Vec<SchemaProperty>> {
    body.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let (name, data_type) = p.split_once(':').ok_or_else(|| {
                PipelineError::validation(format!("Invalid schema property '{}' in line '{}'", p, line))
            })?;
            Ok(SchemaProperty {
                name: name.trim().trim_matches('`').to_string(),
                data_type: data_type.trim().to_string(),
            })
        })
        .collect()
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Nodes,
    Relationships,
    Patterns,
}

impl GraphSchema {
    /// Schema describing what importing `model` produces.
    pub fn from_model(model: &DataModel) -> Self {
        let mut schema = Self::default();
        for node in &model.nodes {
            schema
                .node_properties
                .insert(node.label.clone(), schema_properties(&node.properties));
        }
        for rel in &model.relationships {
            let props = schema
                .relationship_properties
                .entry(rel.rel_type.clone())
                .or_default();
            for prop in schema_properties(&rel.properties) {
                if !props.iter().any(|p| p.name == prop.name) {
                    props.push(prop);
                }
            }
            schema.add_pattern(&rel.start_label, &rel.rel_type, &rel.end_label);
        }
        schema
    }

    /// Parse the textual schema form.
    ///
    /// Labels that only appear in relationship patterns are registered
    /// with no properties.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ValidationError` on a line that fits no section
    pub fn parse(text: &str) -> Result<Self> {
        let mut schema = Self::default();
        let mut section = Section::None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match line {
                NODE_HEADER => {
                    section = Section::Nodes;
                    continue;
                }
                REL_HEADER => {
                    section = Section::Relationships;
                    continue;
                }
                PATTERN_HEADER => {
                    section = Section::Patterns;
                    continue;
                }
                _ => {}
            }

            match section {
                Section::Nodes | Section::Relationships => {
                    let caps = entry_regex().captures(line).ok_or_else(|| {
                        PipelineError::validation(format!("Invalid schema line '{}'", line))
                    })?;
                    let props = parse_properties(&caps[2], line)?;
                    let target = if matches!(section, Section::Nodes) {
                        &mut schema.node_properties
                    } else {
                        &mut schema.relationship_properties
                    };
                    target.insert(caps[1].to_string(), props);
                }
                Section::Patterns => {
                    let caps = pattern_regex().captures(line).ok_or_else(|| {
                        PipelineError::validation(format!("Invalid relationship pattern '{}'", line))
                    })?;
                    schema.add_pattern(&caps[1], &caps[2], &caps[3]);
                }
                Section::None => {
                    return Err(PipelineError::validation(format!(
                        "Schema line outside any section: '{}'",
                        line
                    )))
                }
            }
        }

        Ok(schema)
    }

    fn add_pattern(&mut self, start: &str, rel_type: &str, end: &str) {
        self.node_properties.entry(start.to_string()).or_default();
        self.node_properties.entry(end.to_string()).or_default();
        self.relationship_properties
            .entry(rel_type.to_string())
            .or_default();

        let pattern = SchemaPattern {
            start: start.to_string(),
            rel_type: rel_type.to_string(),
            end: end.to_string(),
        };
        if !self.relationships.contains(&pattern) {
            self.relationships.push(pattern);
        }
    }

    /// Render the textual schema form.
    pub fn render(&self) -> String {
        fn entry(name: &str, props: &[SchemaProperty]) -> String {
            let body: Vec<String> = props
                .iter()
                .map(|p| format!("{}: {}", p.name, p.data_type))
                .collect();
            format!("{} {{{}}}", name, body.join(", "))
        }

        let mut lines = vec![NODE_HEADER.to_string()];
        lines.extend(self.node_properties.iter().map(|(l, p)| entry(l, p)));
        lines.push(REL_HEADER.to_string());
        lines.extend(
            self.relationship_properties
                .iter()
                .filter(|(_, p)| !p.is_empty())
                .map(|(t, p)| entry(t, p)),
        );
        lines.push(PATTERN_HEADER.to_string());
        lines.extend(
            self.relationships
                .iter()
                .map(|p| format!("(:{})-[:{}]->(:{})", p.start, p.rel_type, p.end)),
        );
        lines.join("\n")
    }

    /// Whether `label` is a node label.
    pub fn has_label(&self, label: &str) -> bool {
        self.node_properties.contains_key(label)
    }

    /// Whether `rel_type` is a relationship type.
    pub fn has_relationship_type(&self, rel_type: &str) -> bool {
        self.relationship_properties.contains_key(rel_type)
    }

    /// Whether nodes with `label` carry `property`.
    pub fn label_has_property(&self, label: &str, property: &str) -> bool {
        self.node_properties
            .get(label)
            .is_some_and(|props| props.iter().any(|p| p.name == property))
    }

    /// Whether relationships of `rel_type` carry `property`.
    pub fn relationship_has_property(&self, rel_type: &str, property: &str) -> bool {
        self.relationship_properties
            .get(rel_type)
            .is_some_and(|props| props.iter().any(|p| p.name == property))
    }

    /// Whether any label or relationship type carries `property`.
    pub fn has_property(&self, property: &str) -> bool {
        self.node_properties
            .values()
            .chain(self.relationship_properties.values())
            .any(|props| props.iter().any(|p| p.name == property))
    }

    /// Whether the schema declares nothing.
    pub fn is_empty(&self) -> bool {
        self.node_properties.is_empty() && self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVIES: &str = "Node properties:
Movie {title: STRING, released: INTEGER}
Person {name: STRING}
Relationship properties:
ACTED_IN {role: STRING}
The relationships:
(:Person)-[:ACTED_IN]->(:Movie)";

    #[test]
    fn test_parse_and_render() {
        let schema = GraphSchema::parse(MOVIES).unwrap();
        assert!(schema.has_label("Movie"));
        assert!(schema.label_has_property("Movie", "released"));
        assert!(!schema.label_has_property("Person", "released"));
        assert!(schema.relationship_has_property("ACTED_IN", "role"));
        assert_eq!(schema.relationships.len(), 1);
        assert_eq!(schema.render(), MOVIES);
    }

    #[test]
    fn test_pattern_only_labels_are_registered() {
        let schema = GraphSchema::parse("The relationships:\n(:Movie)-[:IN_GENRE]->(:Genre)").unwrap();
        assert!(schema.has_label("Genre"));
        assert!(schema.has_relationship_type("IN_GENRE"));
        assert!(!schema.has_property("name"));
    }

    #[test]
    fn test_parse_rejects_stray_lines() {
        assert!(GraphSchema::parse("Movie {title: STRING}").is_err());
        assert!(GraphSchema::parse("Node properties:\nnot a schema line").is_err());
    }
}
