//! The Aegis opcode registry.
//!
//! Every instruction kind the compiler can emit and the interpreter can
//! dispatch lives here. The mappings below are exhaustive matches without
//! wildcard arms: adding a variant without a keyword, mnemonic, arity or
//! handler does not compile, and neither does the code generator or the
//! VM dispatch loop until they learn the new opcode.

use serde::{Deserialize, Serialize};

/// Identifies the operation an instruction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // Resource handles
    /// Allocate a qudit handle. Args: name, dimension.
    AllocQudit,
    /// Create an entanglement group from two live handles.
    Entangle,
    /// Break the entanglement group joining two handles.
    Disentangle,
    /// Apply a named gate to a handle. Args: gate, handle.
    ApplyGate,
    /// Collapse a handle. Consumes it.
    Measure,
    /// Explicitly deallocate a handle. Consumes it.
    Release,

    // AI governance
    /// Declare an AI entity with default safety attributes.
    DeclareContract,
    /// Override an entity's explainability score.
    SetExplainability,
    /// Override an entity's oversight level.
    SetOversight,
    /// Override an entity's criticality.
    SetCriticality,
    /// Record an explicit human sign-off for an entity.
    Approve,
    /// Deploy an entity to a target.
    Deploy,
    /// Run a verification check on an entity.
    Verify,
    /// A decision taken by an entity.
    Decide,

    // Classical values
    /// Bind a primitive literal to a name.
    Let,
    /// Write a bound value to the console trace.
    Print,

    // Distributed execution
    /// Set the current target node.
    SetTargetNode,
    /// Set the current channel.
    SetChannel,
    /// Delegate entanglement of a local handle with a remote node.
    EntangleRemote,
    /// Move a local handle to a remote node.
    Teleport,
    /// Cross-node entanglement swap between two local handles.
    EntanglementSwap,
    /// Create a named rendezvous point. Args: name, deadline in ms.
    Barrier,
    /// Register an execution window. Args: name, soft ms, hard ms.
    ScheduleWindow,
}

/// Coarse grouping of opcodes, used for classification and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpcodeGroup {
    Resource,
    Governance,
    Classical,
    Distributed,
}

/// All opcodes, in definition order.
pub const ALL_OPCODES: [Opcode; 23] = [
    Opcode::AllocQudit,
    Opcode::Entangle,
    Opcode::Disentangle,
    Opcode::ApplyGate,
    Opcode::Measure,
    Opcode::Release,
    Opcode::DeclareContract,
    Opcode::SetExplainability,
    Opcode::SetOversight,
    Opcode::SetCriticality,
    Opcode::Approve,
    Opcode::Deploy,
    Opcode::Verify,
    Opcode::Decide,
    Opcode::Let,
    Opcode::Print,
    Opcode::SetTargetNode,
    Opcode::SetChannel,
    Opcode::EntangleRemote,
    Opcode::Teleport,
    Opcode::EntanglementSwap,
    Opcode::Barrier,
    Opcode::ScheduleWindow,
];

impl Opcode {
    /// The surface-syntax keyword that introduces this instruction.
    pub fn keyword(&self) -> &'static str {
        match self {
            Opcode::AllocQudit => "qudit",
            Opcode::Entangle => "entangle",
            Opcode::Disentangle => "disentangle",
            Opcode::ApplyGate => "apply",
            Opcode::Measure => "measure",
            Opcode::Release => "release",
            Opcode::DeclareContract => "contract",
            Opcode::SetExplainability => "explain",
            Opcode::SetOversight => "oversee",
            Opcode::SetCriticality => "classify",
            Opcode::Approve => "approve",
            Opcode::Deploy => "deploy",
            Opcode::Verify => "verify",
            Opcode::Decide => "decide",
            Opcode::Let => "let",
            Opcode::Print => "print",
            Opcode::SetTargetNode => "node",
            Opcode::SetChannel => "channel",
            Opcode::EntangleRemote => "entangle_remote",
            Opcode::Teleport => "teleport",
            Opcode::EntanglementSwap => "swap",
            Opcode::Barrier => "barrier",
            Opcode::ScheduleWindow => "window",
        }
    }

    /// The bytecode mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::AllocQudit => "ALLOC_QUDIT",
            Opcode::Entangle => "ENTANGLE",
            Opcode::Disentangle => "DISENTANGLE",
            Opcode::ApplyGate => "APPLY_GATE",
            Opcode::Measure => "MEASURE",
            Opcode::Release => "RELEASE",
            Opcode::DeclareContract => "DECLARE_CONTRACT",
            Opcode::SetExplainability => "SET_EXPLAINABILITY",
            Opcode::SetOversight => "SET_OVERSIGHT",
            Opcode::SetCriticality => "SET_CRITICALITY",
            Opcode::Approve => "APPROVE",
            Opcode::Deploy => "DEPLOY",
            Opcode::Verify => "VERIFY",
            Opcode::Decide => "DECIDE",
            Opcode::Let => "LET",
            Opcode::Print => "PRINT",
            Opcode::SetTargetNode => "SET_TARGET_NODE",
            Opcode::SetChannel => "SET_CHANNEL",
            Opcode::EntangleRemote => "ENTANGLE_REMOTE",
            Opcode::Teleport => "TELEPORT",
            Opcode::EntanglementSwap => "ENTANGLEMENT_SWAP",
            Opcode::Barrier => "BARRIER",
            Opcode::ScheduleWindow => "SCHEDULE_WINDOW",
        }
    }

    /// Number of argument tokens the keyword consumes.
    pub fn arity(&self) -> usize {
        match self {
            Opcode::Measure
            | Opcode::Release
            | Opcode::DeclareContract
            | Opcode::Approve
            | Opcode::Verify
            | Opcode::Print
            | Opcode::SetTargetNode
            | Opcode::SetChannel => 1,

            Opcode::AllocQudit
            | Opcode::Entangle
            | Opcode::Disentangle
            | Opcode::ApplyGate
            | Opcode::SetExplainability
            | Opcode::SetOversight
            | Opcode::SetCriticality
            | Opcode::Deploy
            | Opcode::Decide
            | Opcode::Let
            | Opcode::EntangleRemote
            | Opcode::Teleport
            | Opcode::EntanglementSwap
            | Opcode::Barrier => 2,

            Opcode::ScheduleWindow => 3,
        }
    }

    /// Name of the interpreter method that executes this opcode.
    pub fn handler_name(&self) -> &'static str {
        match self {
            Opcode::AllocQudit => "exec_alloc_qudit",
            Opcode::Entangle => "exec_entangle",
            Opcode::Disentangle => "exec_disentangle",
            Opcode::ApplyGate => "exec_apply_gate",
            Opcode::Measure => "exec_measure",
            Opcode::Release => "exec_release",
            Opcode::DeclareContract => "exec_declare_contract",
            Opcode::SetExplainability => "exec_set_explainability",
            Opcode::SetOversight => "exec_set_oversight",
            Opcode::SetCriticality => "exec_set_criticality",
            Opcode::Approve => "exec_approve",
            Opcode::Deploy => "exec_deploy",
            Opcode::Verify => "exec_verify",
            Opcode::Decide => "exec_decide",
            Opcode::Let => "exec_let",
            Opcode::Print => "exec_print",
            Opcode::SetTargetNode => "exec_set_target_node",
            Opcode::SetChannel => "exec_set_channel",
            Opcode::EntangleRemote => "exec_entangle_remote",
            Opcode::Teleport => "exec_teleport",
            Opcode::EntanglementSwap => "exec_entanglement_swap",
            Opcode::Barrier => "exec_barrier",
            Opcode::ScheduleWindow => "exec_schedule_window",
        }
    }

    pub fn group(&self) -> OpcodeGroup {
        match self {
            Opcode::AllocQudit
            | Opcode::Entangle
            | Opcode::Disentangle
            | Opcode::ApplyGate
            | Opcode::Measure
            | Opcode::Release => OpcodeGroup::Resource,

            Opcode::DeclareContract
            | Opcode::SetExplainability
            | Opcode::SetOversight
            | Opcode::SetCriticality
            | Opcode::Approve
            | Opcode::Deploy
            | Opcode::Verify
            | Opcode::Decide => OpcodeGroup::Governance,

            Opcode::Let | Opcode::Print => OpcodeGroup::Classical,

            Opcode::SetTargetNode
            | Opcode::SetChannel
            | Opcode::EntangleRemote
            | Opcode::Teleport
            | Opcode::EntanglementSwap
            | Opcode::Barrier
            | Opcode::ScheduleWindow => OpcodeGroup::Distributed,
        }
    }

    /// True for operations that consume their resource operand.
    ///
    /// Consumption is what the no-cloning usage tracker counts.
    pub fn is_consuming(&self) -> bool {
        matches!(self, Opcode::Measure | Opcode::Release | Opcode::Teleport)
    }

    /// Look up an opcode by surface keyword, ignoring ASCII case.
    pub fn from_keyword(word: &str) -> Option<Opcode> {
        ALL_OPCODES
            .iter()
            .find(|op| op.keyword().eq_ignore_ascii_case(word))
            .copied()
    }

    /// Look up an opcode by bytecode mnemonic (exact match).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        ALL_OPCODES
            .iter()
            .find(|op| op.mnemonic() == mnemonic)
            .copied()
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Returns true iff `mnemonic` names an opcode in the registry.
pub fn is_valid_opcode(mnemonic: &str) -> bool {
    Opcode::from_mnemonic(mnemonic).is_some()
}
