//! Additive merge of data model updates.
//!
//! A model-builder pass returns a proposed model. Whatever the proposal
//! omits is kept; whatever it adds is appended; elements present in both
//! keep their identity while descriptions and metadata are combined
//! according to a [`ConflictPolicy`]. Nothing is ever removed.

use crate::types::{DataModel, NodeDef, PipelineError, PropertyDef, Result};
use serde::{Deserialize, Serialize};

/// How to reconcile an element that both the existing model and the update define differently.
///
/// There is no right answer in general, so the choice belongs to the
/// caller. `Append` is only a placeholder default that loses nothing;
/// every conflict is still listed in [`MergeOutcome::conflicts`] whatever
/// the policy, and `Reject` hands the first one back as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the existing description/type, drop the incoming one
    KeepExisting,
    /// Take the incoming description/type
    PreferIncoming,
    /// Keep the existing type; extend the description with the incoming text
    #[default]
    Append,
    /// Fail with `PipelineError::MergeConflict`
    Reject,
}

/// Result of merging an update into a model.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Merged model
    pub model: DataModel,

    /// Existing elements the update left out (kept anyway)
    pub restored: Vec<String>,

    /// Elements the update introduced
    pub added: Vec<String>,

    /// Conflicts resolved by the policy
    pub conflicts: Vec<String>,
}

struct Merger {
    policy: ConflictPolicy,
    conflicts: Vec<String>,
    added: Vec<String>,
}

impl Merger {
    fn text(&mut self, element: &str, existing: &str, incoming: &str) -> Result<String> {
        let (old, new) = (existing.trim(), incoming.trim());
        if new.is_empty() || old == new || old.contains(new) {
            return Ok(existing.to_string());
        }
        if old.is_empty() || new.contains(old) {
            return Ok(incoming.to_string());
        }

        self.conflicts.push(format!("{} description", element));
        match self.policy {
            ConflictPolicy::KeepExisting => Ok(existing.to_string()),
            ConflictPolicy::PreferIncoming => Ok(incoming.to_string()),
            ConflictPolicy::Append => Ok(format!("{} {}", old, new)),
            ConflictPolicy::Reject => Err(PipelineError::MergeConflict {
                element: element.to_string(),
                detail: format!("description '{}' vs '{}'", old, new),
            }),
        }
    }

    fn property(&mut self, element: &str, existing: &mut PropertyDef, incoming: &PropertyDef) -> Result<()> {
        existing.description = self.text(element, &existing.description, &incoming.description)?;

        if existing.data_type != incoming.data_type {
            self.conflicts.push(format!("{} type", element));
            match self.policy {
                ConflictPolicy::PreferIncoming => existing.data_type = incoming.data_type,
                ConflictPolicy::Reject => {
                    return Err(PipelineError::MergeConflict {
                        element: element.to_string(),
                        detail: format!("type {} vs {}", existing.data_type, incoming.data_type),
                    })
                }
                ConflictPolicy::KeepExisting | ConflictPolicy::Append => {}
            }
        }

        match (existing.column_name.clone(), incoming.column_name.clone()) {
            (None, Some(column)) => existing.column_name = Some(column),
            (Some(old), Some(new)) if old != new => {
                self.conflicts.push(format!("{} column", element));
                match self.policy {
                    ConflictPolicy::PreferIncoming => existing.column_name = Some(new),
                    ConflictPolicy::Reject => {
                        return Err(PipelineError::MergeConflict {
                            element: element.to_string(),
                            detail: format!("column '{}' vs '{}'", old, new),
                        })
                    }
                    ConflictPolicy::KeepExisting | ConflictPolicy::Append => {}
                }
            }
            _ => {}
        }

        if existing.composite_of.is_empty() {
            existing.composite_of = incoming.composite_of.clone();
        }

        for step in &incoming.preparation {
            if !existing.preparation.contains(step) {
                existing.preparation.push(step.clone());
            }
        }
        Ok(())
    }

    fn properties(
        &mut self,
        owner: &str,
        existing: &mut Vec<PropertyDef>,
        incoming: &[PropertyDef],
    ) -> Result<()> {
        for prop in incoming {
            let element = format!("{}.{}", owner, prop.key);
            match existing.iter_mut().find(|p| p.key == prop.key) {
                Some(current) => self.property(&element, current, prop)?,
                None => {
                    self.added.push(element);
                    existing.push(prop.clone());
                }
            }
        }
        Ok(())
    }

    fn node(&mut self, existing: &mut NodeDef, incoming: &NodeDef) -> Result<()> {
        let had_key = existing.key_property().map(|p| p.key.clone());
        existing.description = self.text(&existing.label, &existing.description, &incoming.description)?;
        self.properties(&existing.label.clone(), &mut existing.properties, &incoming.properties)?;

        // A node keeps a single merge key: the first one it was given.
        if let Some(key) = had_key {
            for prop in existing.properties.iter_mut() {
                if prop.unique && prop.key != key {
                    prop.unique = false;
                    self.conflicts.push(format!("{}.{} unique", existing.label, prop.key));
                }
            }
        } else if let Some(first) = existing.properties.iter().position(|p| p.unique) {
            for (i, prop) in existing.properties.iter_mut().enumerate() {
                prop.unique = i == first;
            }
        }
        Ok(())
    }
}

/// Merge an update into an existing model without removing anything.
///
/// # Arguments
///
/// * `existing` - Model before this pass
/// * `update` - Model proposed by this pass (may omit existing elements)
/// * `policy` - How to resolve differing descriptions, types and columns
///
/// # Returns
///
/// `MergeOutcome` with the merged model and a record of what happened
///
/// # Errors
///
/// Returns `PipelineError::MergeConflict` when `policy` is `Reject` and
/// the update disagrees with the existing model
pub fn merge_models(
    existing: &DataModel,
    update: &DataModel,
    policy: ConflictPolicy,
) -> Result<MergeOutcome> {
    let mut merged = existing.clone();
    let mut merger = Merger {
        policy,
        conflicts: Vec::new(),
        added: Vec::new(),
    };

    for node in &update.nodes {
        match merged.nodes.iter_mut().find(|n| n.label == node.label) {
            Some(current) => merger.node(current, node)?,
            None => {
                merger.added.push(format!("node {}", node.label));
                merged.nodes.push(node.clone());
            }
        }
    }

    for rel in &update.relationships {
        match merged.relationships.iter_mut().find(|r| r.key() == rel.key()) {
            Some(current) => {
                let element = rel.rel_type.clone();
                current.description = merger.text(&element, &current.description, &rel.description)?;
                merger.properties(&element, &mut current.properties, &rel.properties)?;
            }
            None => {
                merger.added.push(format!(
                    "relationship (:{})-[:{}]->(:{})",
                    rel.start_label, rel.rel_type, rel.end_label
                ));
                merged.relationships.push(rel.clone());
            }
        }
    }

    let restored = verify_additive(existing, update);

    Ok(MergeOutcome {
        model: merged,
        restored,
        added: merger.added,
        conflicts: merger.conflicts,
    })
}

/// List every element of `before` that `after` no longer contains.
///
/// An empty result means `after` is a pure extension of `before`.
pub fn verify_additive(before: &DataModel, after: &DataModel) -> Vec<String> {
    let mut missing = Vec::new();

    for node in &before.nodes {
        match after.node(&node.label) {
            None => missing.push(format!("node {}", node.label)),
            Some(kept) => {
                for prop in &node.properties {
                    if kept.property(&prop.key).is_none() {
                        missing.push(format!("{}.{}", node.label, prop.key));
                    }
                }
            }
        }
    }

    for rel in &before.relationships {
        let (rel_type, start, end) = rel.key();
        match after.relationship(rel_type, start, end) {
            None => missing.push(format!(
                "relationship (:{})-[:{}]->(:{})",
                start, rel_type, end
            )),
            Some(kept) => {
                for prop in &rel.properties {
                    if kept.property(&prop.key).is_none() {
                        missing.push(format!("{}.{}", rel_type, prop.key));
                    }
                }
            }
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Preparation, PropertyType, RelationshipDef};

    fn base() -> DataModel {
        DataModel {
            nodes: vec![NodeDef::new(
                "Movie",
                vec![PropertyDef::new("title", PropertyType::String)
                    .unique()
                    .with_description("Movie title")],
            )
            .with_description("A film")],
            relationships: vec![],
        }
    }

    #[test]
    fn test_update_omitting_elements_keeps_them() {
        let update = DataModel {
            nodes: vec![NodeDef::new(
                "Person",
                vec![PropertyDef::new("name", PropertyType::String).unique()],
            )],
            relationships: vec![RelationshipDef::new("ACTED_IN", "Person", "Movie", vec![])],
        };

        let outcome = merge_models(&base(), &update, ConflictPolicy::Append).unwrap();
        assert!(outcome.model.node("Movie").is_some());
        assert!(outcome.model.node("Person").is_some());
        assert_eq!(outcome.restored, vec!["node Movie".to_string()]);
        assert_eq!(outcome.added.len(), 2);
        assert!(verify_additive(&base(), &outcome.model).is_empty());
    }

    #[test]
    fn test_description_policies() {
        let update = DataModel {
            nodes: vec![NodeDef::new("Movie", vec![]).with_description("Released in cinemas")],
            relationships: vec![],
        };

        let keep = merge_models(&base(), &update, ConflictPolicy::KeepExisting).unwrap();
        assert_eq!(keep.model.nodes[0].description, "A film");

        let prefer = merge_models(&base(), &update, ConflictPolicy::PreferIncoming).unwrap();
        assert_eq!(prefer.model.nodes[0].description, "Released in cinemas");

        let append = merge_models(&base(), &update, ConflictPolicy::Append).unwrap();
        assert_eq!(append.model.nodes[0].description, "A film Released in cinemas");
        assert_eq!(append.conflicts, vec!["Movie description".to_string()]);

        let reject = merge_models(&base(), &update, ConflictPolicy::Reject);
        assert!(matches!(reject, Err(PipelineError::MergeConflict { .. })));
    }

    #[test]
    fn test_default_policy_reports_conflicts() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Append);

        let update = DataModel {
            nodes: vec![NodeDef::new(
                "Movie",
                vec![PropertyDef::new("title", PropertyType::String).with_description("Original title")],
            )
            .with_description("Released in cinemas")],
            relationships: vec![],
        };
        let outcome = merge_models(&base(), &update, ConflictPolicy::default()).unwrap();
        assert_eq!(outcome.model.nodes[0].description, "A film Released in cinemas");
        assert!(outcome.conflicts.contains(&"Movie description".to_string()));
        assert!(outcome.conflicts.iter().any(|c| c.starts_with("Movie.title")));
    }

    #[test]
    fn test_augmented_description_is_not_a_conflict() {
        let update = DataModel {
            nodes: vec![NodeDef::new("Movie", vec![]).with_description("A film. Identified by title.")],
            relationships: vec![],
        };
        let outcome = merge_models(&base(), &update, ConflictPolicy::Reject).unwrap();
        assert_eq!(outcome.model.nodes[0].description, "A film. Identified by title.");
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_property_merge_extends() {
        let update = DataModel {
            nodes: vec![NodeDef::new(
                "Movie",
                vec![
                    PropertyDef::new("title", PropertyType::Integer)
                        .with_column("movie_title")
                        .with_preparation(Preparation::Trim),
                    PropertyDef::new("released", PropertyType::Integer).unique(),
                ],
            )],
            relationships: vec![],
        };

        let outcome = merge_models(&base(), &update, ConflictPolicy::Append).unwrap();
        let movie = outcome.model.node("Movie").unwrap();
        let title = movie.property("title").unwrap();
        assert_eq!(title.data_type, PropertyType::String);
        assert_eq!(title.column_name.as_deref(), Some("movie_title"));
        assert_eq!(title.preparation, vec![Preparation::Trim]);
        assert_eq!(movie.key_property().unwrap().key, "title");
        assert!(!movie.property("released").unwrap().unique);
    }

    #[test]
    fn test_verify_additive_reports_removals() {
        let after = DataModel {
            nodes: vec![NodeDef::new("Movie", vec![])],
            relationships: vec![],
        };
        assert_eq!(verify_additive(&base(), &after), vec!["Movie.title".to_string()]);
    }
}
