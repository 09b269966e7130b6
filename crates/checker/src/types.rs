//! Inferred semantic types.

use crate::constraint::{CheckPhase, Constraint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Quantum,
    Ai,
    Primitive,
    Compound,
    Unknown,
}

/// The type attached to one syntax node.
///
/// Built once per node during inference and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredType {
    pub kind: TypeKind,
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub constraints: Vec<Constraint>,
    /// Names this node depends on.
    pub dependencies: Vec<String>,
}

impl InferredType {
    pub fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: BTreeMap::new(),
            constraints: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(TypeKind::Unknown, "Unknown")
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == TypeKind::Unknown
    }

    pub fn with_property(mut self, key: &str, value: impl ToString) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_dependency(mut self, name: &str) -> Self {
        self.dependencies.push(name.to_string());
        self
    }

    /// Constraints to evaluate in `phase`, in attachment order.
    pub fn constraints_in(&self, phase: CheckPhase) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.phase == phase)
    }
}
