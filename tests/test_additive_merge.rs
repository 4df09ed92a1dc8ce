//! Property tests: merging model updates never removes anything.

use percolate_csv_graph::rules::{merge_models, verify_additive, ConflictPolicy};
use percolate_csv_graph::types::{DataModel, NodeDef, PropertyDef, PropertyType, RelationshipDef};
use proptest::prelude::*;

const LABELS: [&str; 4] = ["Movie", "Person", "Genre", "Studio"];
const KEYS: [&str; 5] = ["title", "name", "released", "tagline", "id"];
const TYPES: [&str; 3] = ["ACTED_IN", "IN_GENRE", "PRODUCED"];

fn property() -> impl Strategy<Value = PropertyDef> {
    (0..KEYS.len(), any::<bool>(), "[a-z ]{0,12}").prop_map(|(k, integer, description)| {
        let data_type = if integer { PropertyType::Integer } else { PropertyType::String };
        PropertyDef::new(KEYS[k], data_type).with_description(description)
    })
}

fn node() -> impl Strategy<Value = NodeDef> {
    (0..LABELS.len(), prop::collection::vec(property(), 0..4), "[a-z ]{0,12}").prop_map(
        |(l, mut properties, description)| {
            properties.dedup_by(|a, b| a.key == b.key);
            if let Some(first) = properties.first_mut() {
                first.unique = true;
            }
            NodeDef::new(LABELS[l], properties).with_description(description)
        },
    )
}

fn relationship() -> impl Strategy<Value = RelationshipDef> {
    (0..TYPES.len(), 0..LABELS.len(), 0..LABELS.len(), prop::collection::vec(property(), 0..2))
        .prop_map(|(t, s, e, properties)| {
            RelationshipDef::new(TYPES[t], LABELS[s], LABELS[e], properties)
        })
}

/// One model-builder proposal: any subset of elements, possibly omitting
/// everything the running model already has.
fn update() -> impl Strategy<Value = DataModel> {
    (
        prop::collection::vec(node(), 0..3),
        prop::collection::vec(relationship(), 0..2),
    )
        .prop_map(|(nodes, relationships)| DataModel { nodes, relationships })
}

fn policy() -> impl Strategy<Value = ConflictPolicy> {
    prop_oneof![
        Just(ConflictPolicy::KeepExisting),
        Just(ConflictPolicy::PreferIncoming),
        Just(ConflictPolicy::Append),
    ]
}

proptest! {
    #[test]
    fn test_merge_never_removes(updates in prop::collection::vec(update(), 1..8), policy in policy()) {
        let mut model = DataModel::new();
        for update in &updates {
            let outcome = merge_models(&model, update, policy).unwrap();
            prop_assert!(verify_additive(&model, &outcome.model).is_empty());
            prop_assert!(outcome.model.property_count() >= model.property_count());
            model = outcome.model;
        }
    }

    #[test]
    fn test_reject_policy_never_removes_either(updates in prop::collection::vec(update(), 1..8)) {
        let mut model = DataModel::new();
        for update in &updates {
            match merge_models(&model, update, ConflictPolicy::Reject) {
                Ok(outcome) => {
                    prop_assert!(verify_additive(&model, &outcome.model).is_empty());
                    model = outcome.model;
                }
                // A refused update leaves the running model untouched
                Err(_) => {}
            }
        }
    }
}
