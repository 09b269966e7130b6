//! Pass 0: fold entity modifiers into final entity attributes.
//!
//! Entity constraints are checked statically against the attributes an
//! entity ends the program with, so `contract bot; classify bot high;
//! oversee bot approval` and the same statements with the modifiers
//! swapped get the same verdict. Modifiers that name an entity not yet
//! declared are ignored here and reported by inference.

use crate::context::EntityView;
use aegis_common::{EntityModifier, NodeMetadata, SyntaxNode};
use std::collections::BTreeMap;

pub fn fold_entities(nodes: &[SyntaxNode]) -> BTreeMap<String, EntityView> {
    let mut entities: BTreeMap<String, EntityView> = BTreeMap::new();

    for node in nodes {
        match &node.metadata {
            NodeMetadata::Entity {
                name,
                explainability,
                oversight,
                criticality,
            } => {
                entities.entry(name.clone()).or_insert(EntityView {
                    explainability: *explainability,
                    oversight: *oversight,
                    criticality: *criticality,
                    ..EntityView::default()
                });
            }
            NodeMetadata::Modifier { entity, modifier } => {
                let Some(view) = entities.get_mut(entity) else {
                    continue;
                };
                match modifier {
                    EntityModifier::Explainability { score: Some(score) }
                        if (0.0..=1.0).contains(score) =>
                    {
                        view.explainability = *score;
                    }
                    EntityModifier::Oversight { level: Some(level) } => view.oversight = *level,
                    EntityModifier::Criticality { level: Some(level) } => {
                        view.criticality = *level
                    }
                    EntityModifier::Approval => view.approved = true,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    entities
}
