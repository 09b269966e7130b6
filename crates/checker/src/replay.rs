//! Pass 2: replay nodes in order and evaluate their constraints.
//!
//! For each node, `Pre` constraints are evaluated, the node's effect on
//! usage counts is applied, then `Post` constraints are evaluated. `Final`
//! constraints are evaluated once against the end state. Every constraint
//! is evaluated independently, except that a resource already reported as
//! used after consumption is not reported again by the program-wide count.

use crate::constraint::{CheckPhase, ConstraintKind, UsageScope};
use crate::context::{ConstraintContext, EntityView};
use crate::types::InferredType;
use aegis_common::{Diagnostic, NodeMetadata, Opcode, SyntaxNode};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default, Clone)]
struct ResourceFacts {
    consumed: usize,
    interactions: usize,
    entangled: bool,
}

/// The checker's view of the program at one point of the replay.
pub struct ReplayState<'a> {
    resources: HashMap<String, ResourceFacts>,
    entities: &'a BTreeMap<String, EntityView>,
    max_coherent_operations: usize,
}

impl<'a> ReplayState<'a> {
    pub fn new(entities: &'a BTreeMap<String, EntityView>, max_coherent_operations: usize) -> Self {
        Self {
            resources: HashMap::new(),
            entities,
            max_coherent_operations,
        }
    }

    fn facts(&mut self, resource: &str) -> Option<&mut ResourceFacts> {
        self.resources.get_mut(resource)
    }

    /// Apply the usage effect of a well-typed node.
    fn apply(&mut self, node: &SyntaxNode) {
        match &node.metadata {
            NodeMetadata::Resource { name, .. } => {
                self.resources.insert(name.clone(), ResourceFacts::default());
            }
            NodeMetadata::Operation {
                operands,
                consuming,
                ..
            } => {
                let entangles = matches!(node.opcode, Opcode::Entangle | Opcode::EntangleRemote);
                for resource in operands {
                    if let Some(facts) = self.facts(resource) {
                        facts.interactions += 1;
                        if *consuming {
                            facts.consumed += 1;
                        }
                        if entangles {
                            facts.entangled = true;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

impl ConstraintContext for ReplayState<'_> {
    fn consumed_count(&self, resource: &str) -> usize {
        self.resources.get(resource).map_or(0, |f| f.consumed)
    }

    fn is_tracked(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    fn is_coherent(&self, resource: &str) -> bool {
        self.resources
            .get(resource)
            .is_some_and(|f| f.interactions < self.max_coherent_operations)
    }

    fn was_entangled(&self, resource: &str) -> bool {
        self.resources.get(resource).is_some_and(|f| f.entangled)
    }

    fn entity(&self, name: &str) -> Option<EntityView> {
        self.entities.get(name).copied()
    }
}

/// Resources whose reuse was already reported at the offending node.
#[derive(Default)]
struct Reported(HashSet<String>);

impl Reported {
    fn note(&mut self, kind: &ConstraintKind) {
        if let ConstraintKind::NoCloning {
            resource,
            scope: UsageScope::Operation,
        } = kind
        {
            self.0.insert(resource.clone());
        }
    }

    fn covers(&self, kind: &ConstraintKind) -> bool {
        matches!(
            kind,
            ConstraintKind::NoCloning { resource, scope: UsageScope::Program }
                if self.0.contains(resource)
        )
    }
}

fn evaluate_phase(
    state: &ReplayState<'_>,
    node: &SyntaxNode,
    ty: &InferredType,
    phase: CheckPhase,
    reported: &mut Reported,
    out: &mut Vec<Diagnostic>,
) {
    for constraint in ty.constraints_in(phase) {
        if reported.covers(&constraint.kind) {
            continue;
        }
        if let Err(violation) = constraint.evaluate(state) {
            reported.note(&constraint.kind);
            out.push(violation.into_diagnostic(node.location, constraint.required));
        }
    }
}

pub fn replay(
    nodes: &[SyntaxNode],
    types: &[InferredType],
    entities: &BTreeMap<String, EntityView>,
    max_coherent_operations: usize,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut state = ReplayState::new(entities, max_coherent_operations);
    let mut reported = Reported::default();

    for (node, ty) in nodes.iter().zip(types) {
        if ty.is_unknown() {
            continue;
        }
        evaluate_phase(&state, node, ty, CheckPhase::Pre, &mut reported, &mut diagnostics);
        state.apply(node);
        evaluate_phase(&state, node, ty, CheckPhase::Post, &mut reported, &mut diagnostics);
    }

    for (node, ty) in nodes.iter().zip(types) {
        evaluate_phase(&state, node, ty, CheckPhase::Final, &mut reported, &mut diagnostics);
    }

    diagnostics
}
