//! Pass 1: infer a type for every node and attach its constraints.
//!
//! Names resolve against tables built in program order, so a use before
//! the declaring statement does not resolve. A node that fails resolution
//! is typed `Unknown` and carries no constraints.

use crate::constraint::{CheckPhase, Constraint, UsageScope};
use crate::context::EntityView;
use crate::error::CheckError;
use crate::types::{InferredType, TypeKind};
use crate::CheckerOptions;
use aegis_common::{
    Diagnostic, Directive, EntityModifier, ErrorCategory, GovernedAction, NodeMetadata, Opcode,
    SyntaxNode,
};
use std::collections::{BTreeMap, BTreeSet};

/// Names declared so far in the current pass.
#[derive(Debug, Default)]
pub struct SymbolTables {
    pub resources: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    pub variables: BTreeMap<String, InferredType>,
}

impl SymbolTables {
    pub fn clear(&mut self) {
        self.resources.clear();
        self.entities.clear();
        self.variables.clear();
    }
}

pub(crate) struct Inference<'a> {
    tables: &'a mut SymbolTables,
    entities: &'a BTreeMap<String, EntityView>,
    options: &'a CheckerOptions,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'a> Inference<'a> {
    pub(crate) fn new(
        tables: &'a mut SymbolTables,
        entities: &'a BTreeMap<String, EntityView>,
        options: &'a CheckerOptions,
    ) -> Self {
        Self {
            tables,
            entities,
            options,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn infer(&mut self, node: &SyntaxNode) -> InferredType {
        match &node.metadata {
            NodeMetadata::Resource {
                name,
                dimension,
                partners,
            } => self.infer_resource(node, name, *dimension, partners),
            NodeMetadata::Operation {
                operands,
                gate,
                remote_node,
                consuming,
            } => self.infer_operation(node, operands, gate.as_deref(), remote_node.as_deref(), *consuming),
            NodeMetadata::Entity { name, .. } => self.infer_entity(node, name),
            NodeMetadata::Modifier { entity, modifier } => {
                self.infer_modifier(node, entity, modifier)
            }
            NodeMetadata::Governed { entity, action } => self.infer_governed(node, entity, action),
            NodeMetadata::Decision { entity, action } => self.infer_decision(node, entity, action),
            NodeMetadata::Literal { name, value } => {
                let ty = InferredType::new(TypeKind::Primitive, value.type_name())
                    .with_property("value", value);
                self.tables.variables.insert(name.clone(), ty.clone());
                ty
            }
            NodeMetadata::Reference { name } => match self.tables.variables.get(name) {
                Some(bound) => {
                    let mut ty = InferredType::new(bound.kind, bound.name.clone())
                        .with_dependency(name);
                    ty.properties = bound.properties.clone();
                    ty
                }
                None => self.unresolved(node, "variable", name),
            },
            NodeMetadata::Directive(directive) => self.infer_directive(node, directive),
        }
    }

    fn report(&mut self, node: &SyntaxNode, error: CheckError) {
        self.diagnostics.push(error.into_diagnostic(node.location));
    }

    fn unresolved(&mut self, node: &SyntaxNode, namespace: &'static str, name: &str) -> InferredType {
        self.report(
            node,
            CheckError::UnresolvedName {
                namespace,
                name: name.to_string(),
            },
        );
        InferredType::unknown()
    }

    fn infer_resource(
        &mut self,
        node: &SyntaxNode,
        name: &str,
        dimension: Option<u32>,
        partners: &[String],
    ) -> InferredType {
        if !self.tables.resources.insert(name.to_string()) {
            self.report(
                node,
                CheckError::Redeclared {
                    namespace: "resource",
                    name: name.to_string(),
                },
            );
            return InferredType::unknown();
        }

        let type_name = match dimension {
            Some(d) if d >= 2 => format!("Qudit<{d}>"),
            _ => {
                self.report(node, CheckError::InvalidDimension { name: name.to_string() });
                "Qudit".to_string()
            }
        };

        let mut ty = InferredType::new(TypeKind::Quantum, type_name)
            .with_property("entangled", !partners.is_empty())
            .with_constraint(Constraint::no_cloning(name, UsageScope::Program))
            .with_constraint(Constraint::memory_safety(name, CheckPhase::Post));
        if let Some(d) = dimension {
            ty = ty.with_property("dimension", d);
        }
        if !partners.is_empty() {
            ty = ty
                .with_property("partners", partners.join(","))
                .with_constraint(Constraint::entanglement_consistency(name, partners.to_vec()));
            for partner in partners {
                ty = ty.with_dependency(partner);
            }
        }
        ty
    }

    fn infer_operation(
        &mut self,
        node: &SyntaxNode,
        operands: &[String],
        gate: Option<&str>,
        remote_node: Option<&str>,
        consuming: bool,
    ) -> InferredType {
        let missing: Vec<String> = operands
            .iter()
            .filter(|r| !self.tables.resources.contains(*r))
            .cloned()
            .collect();
        if !missing.is_empty() {
            for name in &missing {
                self.report(
                    node,
                    CheckError::UnresolvedName {
                        namespace: "resource",
                        name: name.clone(),
                    },
                );
            }
            return InferredType::unknown();
        }

        if let [a, b] = operands {
            if a == b {
                self.report(
                    node,
                    CheckError::SelfInteraction {
                        operation: node.opcode.keyword(),
                        name: a.clone(),
                    },
                );
            }
        }

        let mut ty = if node.opcode == Opcode::Measure {
            InferredType::new(TypeKind::Primitive, "MeasurementOutcome")
        } else {
            InferredType::new(TypeKind::Quantum, "QuantumOperation")
        }
        .with_property("operation", node.opcode.mnemonic())
        .with_property("consuming", consuming);
        if let Some(gate) = gate {
            ty = ty.with_property("gate", gate);
        }
        if let Some(remote) = remote_node {
            ty = ty.with_property("remote_node", remote);
        }

        for resource in operands {
            ty = ty
                .with_dependency(resource)
                .with_constraint(Constraint::memory_safety(resource, CheckPhase::Pre))
                .with_constraint(Constraint::no_cloning(resource, UsageScope::Operation));
            if node.opcode != Opcode::Measure {
                ty = ty.with_constraint(Constraint::coherence_preservation(resource));
            }
        }
        ty
    }

    fn infer_entity(&mut self, node: &SyntaxNode, name: &str) -> InferredType {
        if !self.tables.entities.insert(name.to_string()) {
            self.report(
                node,
                CheckError::Redeclared {
                    namespace: "entity",
                    name: name.to_string(),
                },
            );
            return InferredType::unknown();
        }
        let view = self.view(name);
        let threshold = self.options.explainability_threshold;

        let mut ty = InferredType::new(TypeKind::Ai, "AIContract")
            .with_property("explainability", view.explainability)
            .with_property("oversight", view.oversight)
            .with_property("criticality", view.criticality)
            .with_constraint(Constraint::explainability(name, threshold, CheckPhase::Post))
            .with_constraint(Constraint::compliance(name, CheckPhase::Post));
        if view.criticality.requires_oversight() {
            ty = ty.with_constraint(Constraint::human_oversight(name, CheckPhase::Post));
        }
        ty
    }

    fn infer_modifier(
        &mut self,
        node: &SyntaxNode,
        entity: &str,
        modifier: &EntityModifier,
    ) -> InferredType {
        if !self.tables.entities.contains(entity) {
            return self.unresolved(node, "entity", entity);
        }

        let ty = InferredType::new(TypeKind::Ai, "ContractModifier").with_dependency(entity);
        match modifier {
            EntityModifier::Explainability { score } => match score {
                Some(s) if (0.0..=1.0).contains(s) => ty.with_property("explainability", s),
                _ => {
                    self.report(node, CheckError::InvalidScore { entity: entity.to_string() });
                    ty
                }
            },
            EntityModifier::Oversight { level } => match level {
                Some(level) => ty.with_property("oversight", level),
                None => {
                    self.report(
                        node,
                        CheckError::InvalidLevel {
                            kind: "oversight",
                            entity: entity.to_string(),
                        },
                    );
                    ty
                }
            },
            EntityModifier::Criticality { level } => match level {
                Some(level) => ty.with_property("criticality", level),
                None => {
                    self.report(
                        node,
                        CheckError::InvalidLevel {
                            kind: "criticality",
                            entity: entity.to_string(),
                        },
                    );
                    ty
                }
            },
            EntityModifier::Approval => ty.with_property("approved", true),
        }
    }

    fn infer_governed(
        &mut self,
        node: &SyntaxNode,
        entity: &str,
        action: &GovernedAction,
    ) -> InferredType {
        if !self.tables.entities.contains(entity) {
            return self.unresolved(node, "entity", entity);
        }
        match action {
            GovernedAction::Deploy { target } => {
                let threshold = self.options.explainability_threshold;
                InferredType::new(TypeKind::Ai, "Deployment")
                    .with_property("target", target)
                    .with_dependency(entity)
                    .with_constraint(Constraint::explainability(entity, threshold, CheckPhase::Pre))
                    .with_constraint(Constraint::compliance(entity, CheckPhase::Pre))
                    .with_constraint(Constraint::human_oversight(entity, CheckPhase::Pre))
            }
            GovernedAction::Verify => {
                InferredType::new(TypeKind::Ai, "VerificationCheck").with_dependency(entity)
            }
        }
    }

    fn infer_decision(&mut self, node: &SyntaxNode, entity: &str, action: &str) -> InferredType {
        if !self.tables.entities.contains(entity) {
            return self.unresolved(node, "entity", entity);
        }
        let requires_oversight = self.view(entity).criticality.requires_oversight();
        let threshold = self.options.explainability_threshold;

        let mut ty = InferredType::new(TypeKind::Ai, "Decision")
            .with_property("action", action)
            .with_property("requires_oversight", requires_oversight)
            .with_dependency(entity)
            .with_constraint(Constraint::explainability(entity, threshold, CheckPhase::Pre))
            .with_constraint(Constraint::compliance(entity, CheckPhase::Pre));
        if requires_oversight {
            ty = ty.with_constraint(Constraint::human_approval(entity));
        }
        ty
    }

    fn infer_directive(&mut self, node: &SyntaxNode, directive: &Directive) -> InferredType {
        match directive {
            Directive::TargetNode { node: target } => {
                InferredType::new(TypeKind::Compound, "TargetNode").with_property("node", target)
            }
            Directive::Channel { channel } => {
                InferredType::new(TypeKind::Compound, "Channel").with_property("channel", channel)
            }
            Directive::Barrier { name, deadline_ms } => {
                let ty = InferredType::new(TypeKind::Compound, "Barrier");
                match deadline_ms {
                    Some(ms) => ty.with_property("deadline_ms", ms),
                    None => {
                        self.report(node, CheckError::InvalidDeadline { name: name.clone() });
                        ty
                    }
                }
            }
            Directive::Window {
                name,
                soft_ms,
                hard_ms,
            } => {
                let ty = InferredType::new(TypeKind::Compound, "ExecutionWindow");
                match (soft_ms, hard_ms) {
                    (Some(soft), Some(hard)) => {
                        if soft > hard {
                            self.diagnostics.push(Diagnostic::warning(
                                ErrorCategory::Type,
                                node.location,
                                format!("window '{name}' has a soft deadline after its hard deadline"),
                            ));
                        }
                        ty.with_property("soft_ms", soft).with_property("hard_ms", hard)
                    }
                    _ => {
                        self.report(node, CheckError::InvalidDeadline { name: name.clone() });
                        ty
                    }
                }
            }
        }
    }

    fn view(&self, entity: &str) -> EntityView {
        self.entities.get(entity).copied().unwrap_or_default()
    }
}
