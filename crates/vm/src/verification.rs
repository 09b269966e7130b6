//! Operation classification and the verification gate.

use crate::config::VmConfig;
use crate::entities::{AiEntity, EntityTable};
use aegis_common::{ComplianceStatus, Criticality, Instruction, Opcode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Contract,
    Deployment,
    QuantumOp,
    VerificationCheck,
    Decision,
    Configuration,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Contract => "contract",
            OperationKind::Deployment => "deployment",
            OperationKind::QuantumOp => "quantum-op",
            OperationKind::VerificationCheck => "verification-check",
            OperationKind::Decision => "decision",
            OperationKind::Configuration => "configuration",
        }
    }

    /// Kinds that must pass the gate before their handler runs.
    pub fn is_gated(&self) -> bool {
        matches!(self, OperationKind::Deployment | OperationKind::Decision)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationProfile {
    pub kind: OperationKind,
    pub entity: Option<String>,
    pub criticality: Criticality,
    pub threshold: f64,
}

/// Markers in a deployment target that escalate it to `critical`.
const HIGH_RISK_MARKERS: [&str; 2] = ["high-risk", "high_risk"];

fn is_high_risk_target(target: &str) -> bool {
    let target = target.to_ascii_lowercase();
    HIGH_RISK_MARKERS.iter().any(|m| target.contains(m))
}

fn threshold_for(criticality: Criticality, config: &VmConfig) -> f64 {
    if criticality >= Criticality::Critical {
        config.high_risk_threshold
    } else {
        config.explainability_threshold
    }
}

pub fn classify_operation(
    instr: &Instruction,
    entities: &EntityTable,
    config: &VmConfig,
) -> OperationProfile {
    let kind = match instr.opcode {
        Opcode::DeclareContract
        | Opcode::SetExplainability
        | Opcode::SetOversight
        | Opcode::SetCriticality
        | Opcode::Approve => OperationKind::Contract,
        Opcode::Deploy => OperationKind::Deployment,
        Opcode::Verify => OperationKind::VerificationCheck,
        Opcode::Decide => OperationKind::Decision,
        Opcode::AllocQudit
        | Opcode::Entangle
        | Opcode::Disentangle
        | Opcode::ApplyGate
        | Opcode::Measure
        | Opcode::Release
        | Opcode::EntangleRemote
        | Opcode::Teleport
        | Opcode::EntanglementSwap => OperationKind::QuantumOp,
        Opcode::Let
        | Opcode::Print
        | Opcode::SetTargetNode
        | Opcode::SetChannel
        | Opcode::Barrier
        | Opcode::ScheduleWindow => OperationKind::Configuration,
    };

    let entity = match kind {
        OperationKind::Contract
        | OperationKind::Deployment
        | OperationKind::VerificationCheck
        | OperationKind::Decision => Some(instr.arg(0).to_string()),
        OperationKind::QuantumOp | OperationKind::Configuration => None,
    };

    let base = entity
        .as_deref()
        .and_then(|name| entities.get(name))
        .map(|e| e.criticality)
        .unwrap_or(match kind {
            OperationKind::QuantumOp | OperationKind::Configuration => Criticality::Low,
            _ => Criticality::Medium,
        });

    let criticality = if kind == OperationKind::Deployment && is_high_risk_target(instr.arg(1)) {
        base.max(Criticality::Critical)
    } else {
        base
    };

    OperationProfile {
        kind,
        entity,
        criticality,
        threshold: threshold_for(criticality, config),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub passed: bool,
    /// A failure can be resolved by a human decision.
    pub requires_oversight: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier;

impl Verifier {
    pub fn evaluate(
        &self,
        profile: &OperationProfile,
        entity: Option<&AiEntity>,
    ) -> VerificationOutcome {
        let Some(entity) = entity else {
            let reasons = match &profile.entity {
                Some(name) => vec![format!("entity '{name}' is not declared")],
                None => Vec::new(),
            };
            return VerificationOutcome {
                passed: reasons.is_empty(),
                requires_oversight: false,
                reasons,
            };
        };

        let mut reasons = Vec::new();
        if entity.explainability < profile.threshold {
            reasons.push(format!(
                "explainability {} is below the {} threshold {}",
                entity.explainability,
                profile.criticality.name(),
                profile.threshold
            ));
        }
        if entity.compliance == ComplianceStatus::NonCompliant {
            reasons.push(format!("entity '{}' is non-compliant", entity.name));
        }
        if profile.criticality.requires_oversight() && !entity.oversight.is_human_in_loop() {
            reasons.push(format!(
                "'{}' is classified {} but its oversight level is {}",
                entity.name,
                profile.criticality.name(),
                entity.oversight
            ));
        }

        VerificationOutcome {
            passed: reasons.is_empty(),
            requires_oversight: profile.criticality.requires_oversight()
                || entity.oversight.is_human_in_loop(),
            reasons,
        }
    }
}
