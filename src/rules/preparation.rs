//! Data preparation rules.
//!
//! Raw CSV values are text. Every property whose modeled type differs
//! from the raw column needs explicit preparation (cast, split, trim),
//! and its description must say so.

use crate::types::{ColumnDescriptor, DataModel, Preparation, PropertyDef, PropertyType};

const DELIMITER_CANDIDATES: [&str; 4] = ["|", ";", ",", "/"];

/// Column types reported by CSV inspection that mean "raw text".
fn is_textual(data_type: &str) -> bool {
    matches!(
        data_type.trim().to_lowercase().as_str(),
        "" | "string" | "str" | "object" | "text" | "varchar" | "mixed"
    )
}

/// Most frequent list delimiter in the example values.
///
/// # Returns
///
/// `None` if no example contains any candidate delimiter
pub fn guess_delimiter(examples: &[String]) -> Option<&'static str> {
    DELIMITER_CANDIDATES
        .iter()
        .map(|d| (*d, examples.iter().map(|e| e.matches(*d).count()).sum::<usize>()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
}

/// Preparation steps a property needs given the column it reads from.
///
/// - `LIST` properties need a split (delimiter guessed from examples,
///   `,` when nothing matches)
/// - non-string scalar types read from a textual column need a cast
pub fn required_preparation(prop: &PropertyDef, column: &ColumnDescriptor) -> Vec<Preparation> {
    let mut steps = Vec::new();

    if prop.data_type == PropertyType::List && prop.split_delimiter().is_none() {
        let delimiter = guess_delimiter(&column.examples).unwrap_or(",");
        steps.push(Preparation::Split {
            delimiter: delimiter.to_string(),
        });
    }

    let has_cast = prop
        .preparation
        .iter()
        .any(|p| matches!(p, Preparation::Cast { .. }));
    let needs_cast = !matches!(prop.data_type, PropertyType::String | PropertyType::List);
    if needs_cast && !has_cast && is_textual(&column.data_type) {
        steps.push(Preparation::Cast { to: prop.data_type });
    }

    steps
}

/// Append missing preparation steps to a property's description.
///
/// # Returns
///
/// `true` if the description changed
pub fn annotate_preparation(prop: &mut PropertyDef) -> bool {
    let lowered = prop.description.to_lowercase();
    let missing: Vec<String> = prop
        .preparation
        .iter()
        .map(Preparation::describe)
        .filter(|d| !lowered.contains(&d.to_lowercase()))
        .collect();

    if missing.is_empty() {
        return false;
    }

    let note = format!("Preparation: {}.", missing.join(", then "));
    prop.description = if prop.description.trim().is_empty() {
        note
    } else {
        format!("{} {}", prop.description.trim_end(), note)
    };
    true
}

fn prepare_properties(properties: &mut [PropertyDef], column: &ColumnDescriptor) -> usize {
    let mut changed = 0;
    for prop in properties.iter_mut() {
        if !prop.source_columns().contains(&column.key.as_str()) {
            continue;
        }
        let steps = required_preparation(prop, column);
        if !steps.is_empty() {
            // Split must run before any cast of the resulting items.
            for step in steps {
                match step {
                    Preparation::Split { .. } => prop.preparation.insert(0, step),
                    _ => prop.preparation.push(step),
                }
            }
            changed += 1;
        }
        if annotate_preparation(prop) {
            changed += 1;
        }
    }
    changed
}

/// Make every property read from `column` carry (and describe) its preparation.
///
/// # Returns
///
/// Number of property changes made
pub fn ensure_preparation(model: &mut DataModel, column: &ColumnDescriptor) -> usize {
    let nodes: usize = model
        .nodes
        .iter_mut()
        .map(|n| prepare_properties(&mut n.properties, column))
        .sum();
    let rels: usize = model
        .relationships
        .iter_mut()
        .map(|r| prepare_properties(&mut r.properties, column))
        .sum();
    nodes + rels
}

/// Report properties whose preparation is missing or undocumented.
pub fn lint_preparation(model: &DataModel) -> Vec<String> {
    let owners = model
        .nodes
        .iter()
        .map(|n| (n.label.as_str(), &n.properties))
        .chain(
            model
                .relationships
                .iter()
                .map(|r| (r.rel_type.as_str(), &r.properties)),
        );

    let mut findings = Vec::new();
    for (owner, properties) in owners {
        for prop in properties {
            if prop.data_type == PropertyType::List && prop.split_delimiter().is_none() {
                findings.push(format!("{}.{} is a LIST without a split step", owner, prop.key));
            }
            if prop.description.trim().is_empty() {
                findings.push(format!("{}.{} has no description", owner, prop.key));
            }
            let mut copy = prop.clone();
            if annotate_preparation(&mut copy) {
                findings.push(format!(
                    "{}.{} description does not state its data preparation",
                    owner, prop.key
                ));
            }
        }
    }
    findings
}
