//! Annotated syntax tree.
//!
//! One [`SyntaxNode`] per parsed instruction, in execution order. Node
//! metadata is a typed union per node kind. Arguments that could not be
//! interpreted (for example a non-numeric dimension) are kept as `None` so
//! the checker can report them with a location.

use crate::diagnostic::SourceLocation;
use crate::levels::{Criticality, OversightLevel};
use crate::opcode::Opcode;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Default explainability score of a freshly declared contract.
pub const DEFAULT_EXPLAINABILITY: f64 = 0.85;

/// Coarse classification used by type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ResourceDeclaration,
    ResourceOperation,
    EntityDeclaration,
    EntityModifier,
    GovernedAction,
    DecisionCall,
    PrimitiveLiteral,
    VariableReference,
    Directive,
}

impl NodeKind {
    pub fn of(opcode: Opcode) -> NodeKind {
        match opcode {
            Opcode::AllocQudit => NodeKind::ResourceDeclaration,
            Opcode::Entangle
            | Opcode::Disentangle
            | Opcode::ApplyGate
            | Opcode::Measure
            | Opcode::Release
            | Opcode::EntangleRemote
            | Opcode::Teleport
            | Opcode::EntanglementSwap => NodeKind::ResourceOperation,
            Opcode::DeclareContract => NodeKind::EntityDeclaration,
            Opcode::SetExplainability
            | Opcode::SetOversight
            | Opcode::SetCriticality
            | Opcode::Approve => NodeKind::EntityModifier,
            Opcode::Deploy | Opcode::Verify => NodeKind::GovernedAction,
            Opcode::Decide => NodeKind::DecisionCall,
            Opcode::Let => NodeKind::PrimitiveLiteral,
            Opcode::Print => NodeKind::VariableReference,
            Opcode::SetTargetNode
            | Opcode::SetChannel
            | Opcode::Barrier
            | Opcode::ScheduleWindow => NodeKind::Directive,
        }
    }
}

/// A change to an entity's safety attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modifier", rename_all = "snake_case")]
pub enum EntityModifier {
    Explainability { score: Option<f64> },
    Oversight { level: Option<OversightLevel> },
    Criticality { level: Option<Criticality> },
    Approval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GovernedAction {
    Deploy { target: String },
    Verify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum Directive {
    TargetNode { node: String },
    Channel { channel: String },
    Barrier { name: String, deadline_ms: Option<u64> },
    Window { name: String, soft_ms: Option<u64>, hard_ms: Option<u64> },
}

/// Per-kind node metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeMetadata {
    Resource {
        name: String,
        dimension: Option<u32>,
        /// Names this resource is entangled with anywhere in the program.
        partners: Vec<String>,
    },
    Operation {
        operands: Vec<String>,
        gate: Option<String>,
        remote_node: Option<String>,
        consuming: bool,
    },
    Entity {
        name: String,
        explainability: f64,
        oversight: OversightLevel,
        criticality: Criticality,
    },
    Modifier {
        entity: String,
        modifier: EntityModifier,
    },
    Governed {
        entity: String,
        action: GovernedAction,
    },
    Decision {
        entity: String,
        action: String,
    },
    Literal {
        name: String,
        value: Value,
    },
    Reference {
        name: String,
    },
    Directive(Directive),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub opcode: Opcode,
    pub location: SourceLocation,
    /// The statement as written in the source.
    pub value: String,
    pub metadata: NodeMetadata,
}

impl SyntaxNode {
    /// Resource names this node operates on, in argument order.
    pub fn resource_operands(&self) -> &[String] {
        match &self.metadata {
            NodeMetadata::Operation { operands, .. } => operands,
            _ => &[],
        }
    }

    /// The entity this node refers to, if any.
    pub fn entity(&self) -> Option<&str> {
        match &self.metadata {
            NodeMetadata::Entity { name, .. } => Some(name),
            NodeMetadata::Modifier { entity, .. }
            | NodeMetadata::Governed { entity, .. }
            | NodeMetadata::Decision { entity, .. } => Some(entity),
            _ => None,
        }
    }
}
