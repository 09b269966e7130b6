//! Ordinal safety levels attached to AI entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum explainability score an AI-governed operation needs to proceed.
pub const EXPLAINABILITY_THRESHOLD: f64 = 0.85;

/// Threshold applied to operations escalated to `critical` or above.
pub const HIGH_RISK_THRESHOLD: f64 = 0.95;

/// True if `score` meets the default explainability threshold.
pub fn is_high_explainability(score: f64) -> bool {
    score >= EXPLAINABILITY_THRESHOLD
}

/// Required level of human involvement, from none to full control.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OversightLevel {
    None,
    #[default]
    Notification,
    Supervision,
    Approval,
    Control,
}

impl OversightLevel {
    pub const ALL: [OversightLevel; 5] = [
        OversightLevel::None,
        OversightLevel::Notification,
        OversightLevel::Supervision,
        OversightLevel::Approval,
        OversightLevel::Control,
    ];

    /// A human actively participates (supervision, approval or control).
    pub fn is_human_in_loop(&self) -> bool {
        *self >= OversightLevel::Supervision
    }

    pub fn name(&self) -> &'static str {
        match self {
            OversightLevel::None => "none",
            OversightLevel::Notification => "notification",
            OversightLevel::Supervision => "supervision",
            OversightLevel::Approval => "approval",
            OversightLevel::Control => "control",
        }
    }
}

/// Severity classification of an operation or entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    Safety,
}

impl Criticality {
    pub const ALL: [Criticality; 5] = [
        Criticality::Low,
        Criticality::Medium,
        Criticality::High,
        Criticality::Critical,
        Criticality::Safety,
    ];

    /// `high` and above must never run without human oversight.
    pub fn requires_oversight(&self) -> bool {
        *self >= Criticality::High
    }

    /// Explainability threshold an operation at this criticality must meet.
    pub fn threshold(&self) -> f64 {
        if *self >= Criticality::Critical {
            HIGH_RISK_THRESHOLD
        } else {
            EXPLAINABILITY_THRESHOLD
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
            Criticality::Safety => "safety",
        }
    }
}

/// Compliance state of an AI entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Declared but not verified yet.
    #[default]
    Pending,
    Compliant,
    NonCompliant,
}

/// A level name that matches no variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} level '{token}'")]
pub struct UnknownLevel {
    pub kind: &'static str,
    pub token: String,
}

impl FromStr for OversightLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OversightLevel::ALL
            .iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownLevel {
                kind: "oversight",
                token: s.to_string(),
            })
    }
}

impl FromStr for Criticality {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Criticality::ALL
            .iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownLevel {
                kind: "criticality",
                token: s.to_string(),
            })
    }
}

impl fmt::Display for OversightLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
