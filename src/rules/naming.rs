//! Naming conventions for labels, relationship types and property keys.
//!
//! - Node labels: nouns in UpperCamelCase (`Person`, `MovieGenre`)
//! - Relationship types: verbs in UPPER_SNAKE_CASE (`ACTED_IN`)
//! - Property keys: lowerCamelCase, letters only, owner prefix dropped
//!   (`person_id` on `Person` becomes `id`)

use crate::types::{DataModel, PipelineError, PropertyDef, Result};
use std::collections::HashSet;

/// A rename applied while normalizing a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Element path, e.g. `node`, `relationship`, `Person.property`
    pub element: String,
    /// Name before normalization
    pub from: String,
    /// Name after normalization
    pub to: String,
}

/// Split an identifier into words.
///
/// Separators are any non-alphanumeric characters; case transitions
/// (`movieTitle`, `HTTPServer`) also start a new word.
pub fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let boundary = (c.is_uppercase() && (prev.is_lowercase() || prev.is_numeric()))
                || (c.is_uppercase() && prev.is_uppercase() && next_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `movie genre` -> `MovieGenre`
pub fn to_upper_camel_case(input: &str) -> String {
    split_words(input).iter().map(|w| capitalize(w)).collect()
}

/// `actedIn` -> `ACTED_IN`
pub fn to_upper_snake_case(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `Release_Year` -> `releaseYear`
pub fn to_lower_camel_case(input: &str) -> String {
    split_words(input)
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
        .collect()
}

/// Check UpperCamelCase (ASCII letters and digits, leading uppercase).
pub fn is_upper_camel_case(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Check UPPER_SNAKE_CASE.
pub fn is_upper_snake_case(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('_')
        && !name.ends_with('_')
        && !name.contains("__")
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Check a property key: lowerCamelCase, letters only.
pub fn is_valid_property_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphabetic())
}

/// Drop the owner prefix from a property key.
///
/// `person_id` and `personId` on `Person` both become `id`;
/// `movie_id` on `Person` is a reference to another entity and is kept.
pub fn shorten_property_key(key: &str, owner: &str) -> String {
    let words = split_words(key);
    let owner_words: Vec<String> = split_words(owner).iter().map(|w| w.to_lowercase()).collect();

    if !owner_words.is_empty() && words.len() > owner_words.len() {
        let prefix_matches = words
            .iter()
            .zip(owner_words.iter())
            .all(|(w, o)| w.to_lowercase() == *o);
        if prefix_matches {
            return words[owner_words.len()..]
                .iter()
                .map(|w| w.to_lowercase())
                .collect::<Vec<_>>()
                .join("_");
        }
    }
    key.to_string()
}

/// Full property key normalization: shorten, lowerCamelCase, letters only.
pub fn normalize_property_key(key: &str, owner: &str) -> String {
    to_lower_camel_case(&shorten_property_key(key, owner))
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect()
}

fn normalize_properties(
    owner: &str,
    prefix: &str,
    properties: &mut [PropertyDef],
    renames: &mut Vec<Rename>,
) -> Result<()> {
    let mut seen = HashSet::new();

    for prop in properties.iter_mut() {
        let normalized = normalize_property_key(&prop.key, prefix);
        if normalized.is_empty() {
            return Err(PipelineError::validation(format!(
                "Property key '{}' on {} has no letters",
                prop.key, owner
            )));
        }

        if normalized != prop.key {
            let original = std::mem::replace(&mut prop.key, normalized.clone());
            if prop.column_name.is_none() && prop.composite_of.is_empty() {
                prop.column_name = Some(original.clone());
            }
            if !prop.description.contains(&original) {
                let note = format!("Mapped from column `{}`.", original);
                prop.description = if prop.description.is_empty() {
                    note
                } else {
                    format!("{} {}", prop.description.trim_end(), note)
                };
            }
            renames.push(Rename {
                element: format!("{}.property", owner),
                from: original,
                to: normalized.clone(),
            });
        }

        if !seen.insert(normalized.clone()) {
            return Err(PipelineError::validation(format!(
                "Property key '{}' appears twice on {} after normalization",
                normalized, owner
            )));
        }
    }
    Ok(())
}

/// Apply every naming rule to a model.
///
/// Relationship endpoints follow renamed labels. Renamed properties keep
/// their source column in `column_name` and mention it in the description.
///
/// # Returns
///
/// Normalized model plus the list of renames applied
///
/// # Errors
///
/// Returns `PipelineError::ValidationError` if a key normalizes to nothing
/// or two keys of one entity collapse onto the same name
pub fn normalize_model(model: &DataModel) -> Result<(DataModel, Vec<Rename>)> {
    let mut model = model.clone();
    let mut renames = Vec::new();
    let mut label_map = Vec::new();

    for node in model.nodes.iter_mut() {
        let label = to_upper_camel_case(&node.label);
        if label.is_empty() {
            return Err(PipelineError::validation(format!(
                "Node label '{}' has no letters",
                node.label
            )));
        }
        if label != node.label {
            renames.push(Rename {
                element: "node".into(),
                from: node.label.clone(),
                to: label.clone(),
            });
            label_map.push((node.label.clone(), label.clone()));
            node.label = label;
        }
        normalize_properties(&node.label, &node.label, &mut node.properties, &mut renames)?;
    }

    let relabel = |label: &str| -> String {
        label_map
            .iter()
            .find(|(from, _)| from == label)
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| to_upper_camel_case(label))
    };

    for rel in model.relationships.iter_mut() {
        let rel_type = to_upper_snake_case(&rel.rel_type);
        if rel_type.is_empty() {
            return Err(PipelineError::validation(format!(
                "Relationship type '{}' has no letters",
                rel.rel_type
            )));
        }
        if rel_type != rel.rel_type {
            renames.push(Rename {
                element: "relationship".into(),
                from: rel.rel_type.clone(),
                to: rel_type.clone(),
            });
            rel.rel_type = rel_type;
        }
        rel.start_label = relabel(&rel.start_label);
        rel.end_label = relabel(&rel.end_label);
        // Relationship properties are not prefixed with the type name.
        normalize_properties(&rel.rel_type, "", &mut rel.properties, &mut renames)?;
    }

    Ok((model, renames))
}

/// Report naming rule violations without changing anything.
pub fn check_model_naming(model: &DataModel) -> Vec<String> {
    let mut findings = Vec::new();

    for node in &model.nodes {
        if !is_upper_camel_case(&node.label) {
            findings.push(format!("Node label '{}' is not UpperCamelCase", node.label));
        }
        for prop in &node.properties {
            if !is_valid_property_key(&prop.key) {
                findings.push(format!(
                    "Property '{}.{}' is not a letters-only lowerCamelCase key",
                    node.label, prop.key
                ));
            }
        }
    }

    for rel in &model.relationships {
        if !is_upper_snake_case(&rel.rel_type) {
            findings.push(format!(
                "Relationship type '{}' is not UPPER_SNAKE_CASE",
                rel.rel_type
            ));
        }
        for prop in &rel.properties {
            if !is_valid_property_key(&prop.key) {
                findings.push(format!(
                    "Property '{}.{}' is not a letters-only lowerCamelCase key",
                    rel.rel_type, prop.key
                ));
            }
        }
    }

    findings
}
