//! Column descriptors and the accumulating graph data model.
//!
//! The data model is a plain value: each model-builder pass takes the
//! current model by reference and returns a new one. Nothing here holds
//! ambient state.

use crate::types::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One inspected CSV column.
///
/// Produced by whatever inspects the source file (out of scope here) and
/// handed to the model builder read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column header as it appears in the CSV
    pub key: String,

    /// Inferred data type (free text, e.g. "string", "int64")
    #[serde(rename = "type", alias = "data_type")]
    pub data_type: String,

    /// Sample values in file order
    #[serde(default)]
    pub examples: Vec<String>,
}

impl ColumnDescriptor {
    /// Create a new column descriptor.
    pub fn new(key: impl Into<String>, data_type: impl Into<String>, examples: Vec<String>) -> Self {
        Self {
            key: key.into(),
            data_type: data_type.into(),
            examples,
        }
    }
}

/// Property value type, using Neo4j type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    /// Text
    #[default]
    #[serde(alias = "string", alias = "String", alias = "STR", alias = "TEXT")]
    String,
    /// 64-bit integer
    #[serde(alias = "integer", alias = "Integer", alias = "INT", alias = "int")]
    Integer,
    /// 64-bit float
    #[serde(alias = "float", alias = "Float", alias = "DOUBLE", alias = "double")]
    Float,
    /// Boolean
    #[serde(alias = "boolean", alias = "Boolean", alias = "BOOL", alias = "bool")]
    Boolean,
    /// Calendar date
    #[serde(alias = "date", alias = "Date")]
    Date,
    /// Date and time
    #[serde(alias = "DATETIME", alias = "datetime", alias = "DateTime")]
    DateTime,
    /// List of strings (split from a delimited column)
    #[serde(alias = "list", alias = "List", alias = "ARRAY")]
    List,
}

impl PropertyType {
    /// Get the Neo4j type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::DateTime => "DATE_TIME",
            Self::List => "LIST",
        }
    }

    /// Cypher function converting a string into this type.
    ///
    /// # Returns
    ///
    /// `None` for `LIST`, which is produced by a split rather than a cast
    pub fn cast_function(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("toString"),
            Self::Integer => Some("toInteger"),
            Self::Float => Some("toFloat"),
            Self::Boolean => Some("toBoolean"),
            Self::Date => Some("date"),
            Self::DateTime => Some("datetime"),
            Self::List => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data preparation step needed to turn raw CSV text into the modeled value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preparation {
    /// Cast the (string) value to another type
    Cast {
        /// Target type
        to: PropertyType,
    },
    /// Split the value on a delimiter into a list
    Split {
        /// Delimiter, e.g. "|" or ","
        delimiter: String,
    },
    /// Trim surrounding whitespace
    Trim,
}

impl Preparation {
    /// Short human readable description, used to annotate property descriptions.
    pub fn describe(&self) -> String {
        match self {
            Self::Cast { to } => format!("cast to {}", to),
            Self::Split { delimiter } => format!("split on '{}'", delimiter),
            Self::Trim => "trim whitespace".to_string(),
        }
    }
}

/// Property of a node or relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property key (lowerCamelCase, letters only)
    pub key: String,

    /// Modeled type
    #[serde(rename = "type", default)]
    pub data_type: PropertyType,

    /// Source CSV column when it differs from `key`
    #[serde(
        rename = "column_name",
        alias = "columnName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub column_name: Option<String>,

    /// Source columns of a composite identifier
    #[serde(
        rename = "composite_of",
        alias = "compositeOf",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub composite_of: Vec<String>,

    /// Meaning of the property plus any data preparation it needs
    #[serde(default)]
    pub description: String,

    /// Whether this property uniquely identifies the entity (merge key)
    #[serde(default)]
    pub unique: bool,

    /// Data preparation steps, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preparation: Vec<Preparation>,
}

impl PropertyDef {
    /// Create a property with no source mapping or preparation.
    pub fn new(key: impl Into<String>, data_type: PropertyType) -> Self {
        Self {
            key: key.into(),
            data_type,
            column_name: None,
            composite_of: Vec::new(),
            description: String::new(),
            unique: false,
            preparation: Vec::new(),
        }
    }

    /// Map the property to a differently named CSV column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Build the property from several CSV columns (composite identifier).
    pub fn with_composite(mut self, columns: Vec<String>) -> Self {
        self.composite_of = columns;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a preparation step.
    pub fn with_preparation(mut self, step: Preparation) -> Self {
        self.preparation.push(step);
        self
    }

    /// Mark as the unique identifier.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// CSV columns the property is read from.
    ///
    /// Composite columns win, then `column_name`, then the key itself.
    pub fn source_columns(&self) -> Vec<&str> {
        if !self.composite_of.is_empty() {
            return self.composite_of.iter().map(String::as_str).collect();
        }
        vec![self.column_name.as_deref().unwrap_or(&self.key)]
    }

    /// Delimiter of the first split step, if any.
    pub fn split_delimiter(&self) -> Option<&str> {
        self.preparation.iter().find_map(|p| match p {
            Preparation::Split { delimiter } => Some(delimiter.as_str()),
            _ => None,
        })
    }
}

/// Node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Label (UpperCamelCase noun)
    pub label: String,

    /// What the node represents and how to identify it
    #[serde(default)]
    pub description: String,

    /// Properties
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl NodeDef {
    /// Create a node definition.
    pub fn new(label: impl Into<String>, properties: Vec<PropertyDef>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            properties,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Look up a property by key.
    pub fn property(&self, key: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// The property used as merge key (first unique property).
    pub fn key_property(&self) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.unique)
    }
}

/// Relationship definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    /// Relationship type (UPPER_SNAKE_CASE verb)
    #[serde(rename = "type")]
    pub rel_type: String,

    /// Label of the start node
    #[serde(rename = "startLabel", alias = "start_label", alias = "start")]
    pub start_label: String,

    /// Label of the end node
    #[serde(rename = "endLabel", alias = "end_label", alias = "end")]
    pub end_label: String,

    /// Meaning of the relationship plus any field instructions
    #[serde(default)]
    pub description: String,

    /// Properties
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl RelationshipDef {
    /// Create a relationship definition.
    pub fn new(
        rel_type: impl Into<String>,
        start_label: impl Into<String>,
        end_label: impl Into<String>,
        properties: Vec<PropertyDef>,
    ) -> Self {
        Self {
            rel_type: rel_type.into(),
            start_label: start_label.into(),
            end_label: end_label.into(),
            description: String::new(),
            properties,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Identity of the relationship within a model: (type, start, end).
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.rel_type, &self.start_label, &self.end_label)
    }

    /// Look up a property by key.
    pub fn property(&self, key: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.key == key)
    }
}

/// Reference to a single entity (node or relationship) of a data model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    /// Node by label
    Node {
        /// Node label
        label: String,
    },
    /// Relationship by (type, start, end)
    Relationship {
        /// Relationship type
        #[serde(rename = "type")]
        rel_type: String,
        /// Start label
        start: String,
        /// End label
        end: String,
    },
}

impl EntityRef {
    /// Reference a node.
    pub fn node(label: impl Into<String>) -> Self {
        Self::Node {
            label: label.into(),
        }
    }

    /// Reference a relationship.
    pub fn relationship(
        rel_type: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self::Relationship {
            rel_type: rel_type.into(),
            start: start.into(),
            end: end.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { label } => write!(f, "(:{})", label),
            Self::Relationship {
                rel_type,
                start,
                end,
            } => write!(f, "(:{})-[:{}]->(:{})", start, rel_type, end),
        }
    }
}

/// Accumulating graph data model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataModel {
    /// Node definitions
    #[serde(default)]
    pub nodes: Vec<NodeDef>,

    /// Relationship definitions
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
}

impl DataModel {
    /// Empty model (starting point of the first model-builder pass).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a model from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::JsonError` if the text is not a valid model
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize as pretty JSON (the form embedded in prompts).
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check if the model has no nodes and no relationships.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Look up a node by label.
    pub fn node(&self, label: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// Look up a relationship by type and endpoints.
    pub fn relationship(&self, rel_type: &str, start: &str, end: &str) -> Option<&RelationshipDef> {
        self.relationships
            .iter()
            .find(|r| r.key() == (rel_type, start, end))
    }

    /// All entities, nodes first, in declaration order.
    ///
    /// Relationship imports match their endpoint nodes, so nodes must be
    /// imported before any relationship.
    pub fn entities(&self) -> Vec<EntityRef> {
        let nodes = self.nodes.iter().map(|n| EntityRef::node(n.label.clone()));
        let rels = self.relationships.iter().map(|r| {
            EntityRef::relationship(r.rel_type.clone(), r.start_label.clone(), r.end_label.clone())
        });
        nodes.chain(rels).collect()
    }

    /// Check whether an entity exists in the model.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Node { label } => self.node(label).is_some(),
            EntityRef::Relationship {
                rel_type,
                start,
                end,
            } => self.relationship(rel_type, start, end).is_some(),
        }
    }

    /// JSON slice of the model describing a single entity.
    ///
    /// This is the `entity` input of the import-statement stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownEntity` if the entity is not in the model
    pub fn entity_slice(&self, entity: &EntityRef) -> Result<serde_json::Value> {
        let value = match entity {
            EntityRef::Node { label } => self.node(label).map(serde_json::to_value),
            EntityRef::Relationship {
                rel_type,
                start,
                end,
            } => self
                .relationship(rel_type, start, end)
                .map(serde_json::to_value),
        };

        match value {
            Some(v) => Ok(v?),
            None => Err(PipelineError::UnknownEntity(entity.to_string())),
        }
    }

    /// Total number of properties across nodes and relationships.
    pub fn property_count(&self) -> usize {
        self.nodes.iter().map(|n| n.properties.len()).sum::<usize>()
            + self
                .relationships
                .iter()
                .map(|r| r.properties.len())
                .sum::<usize>()
    }
}
