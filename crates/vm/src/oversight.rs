//! Human oversight requests.
//!
//! The interpreter only files requests and reports decisions through
//! [`OversightGateway`]. Queueing, notification and any UI belong to the
//! gateway implementation.

use crate::error::OversightError;
use crate::verification::OperationKind;
use aegis_common::{Criticality, OversightLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversightDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversightRequest {
    pub id: RequestId,
    pub operation_id: String,
    pub kind: OperationKind,
    pub criticality: Criticality,
    pub details: String,
    pub level: OversightLevel,
}

pub trait OversightGateway: Send {
    fn request_oversight(
        &mut self,
        operation_id: &str,
        kind: OperationKind,
        criticality: Criticality,
        details: &str,
        level: OversightLevel,
    ) -> RequestId;

    fn respond_to_oversight(
        &mut self,
        request_id: RequestId,
        decision: OversightDecision,
    ) -> Result<(), OversightError>;
}

/// Keeps requests and answers in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    next: u64,
    requests: BTreeMap<RequestId, OversightRequest>,
    decisions: BTreeMap<RequestId, OversightDecision>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, id: RequestId) -> Option<&OversightRequest> {
        self.requests.get(&id)
    }

    pub fn decision(&self, id: RequestId) -> Option<OversightDecision> {
        self.decisions.get(&id).copied()
    }

    /// Requests that have not been answered yet.
    pub fn pending(&self) -> impl Iterator<Item = &OversightRequest> {
        self.requests
            .values()
            .filter(move |r| !self.decisions.contains_key(&r.id))
    }
}

impl OversightGateway for InMemoryGateway {
    fn request_oversight(
        &mut self,
        operation_id: &str,
        kind: OperationKind,
        criticality: Criticality,
        details: &str,
        level: OversightLevel,
    ) -> RequestId {
        self.next += 1;
        let id = RequestId(self.next);
        self.requests.insert(
            id,
            OversightRequest {
                id,
                operation_id: operation_id.to_string(),
                kind,
                criticality,
                details: details.to_string(),
                level,
            },
        );
        id
    }

    fn respond_to_oversight(
        &mut self,
        request_id: RequestId,
        decision: OversightDecision,
    ) -> Result<(), OversightError> {
        if !self.requests.contains_key(&request_id) {
            return Err(OversightError::UnknownRequest(request_id.0));
        }
        if self.decisions.contains_key(&request_id) {
            return Err(OversightError::AlreadyAnswered(request_id.0));
        }
        self.decisions.insert(request_id, decision);
        Ok(())
    }
}

/// One line of the session's oversight audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversightLogEntry {
    pub request: OversightRequest,
    pub decision: Option<OversightDecision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(gateway: &mut InMemoryGateway) -> RequestId {
        gateway.request_oversight(
            "deploy:3",
            OperationKind::Deployment,
            Criticality::Critical,
            "deploy bot to high-risk-zone",
            OversightLevel::Approval,
        )
    }

    #[test]
    fn request_then_answer() {
        let mut gateway = InMemoryGateway::new();
        let id = file(&mut gateway);
        assert_eq!(gateway.pending().count(), 1);
        gateway.respond_to_oversight(id, OversightDecision::Approve).unwrap();
        assert_eq!(gateway.pending().count(), 0);
        assert_eq!(gateway.decision(id), Some(OversightDecision::Approve));
        assert_eq!(gateway.request(id).unwrap().operation_id, "deploy:3");
    }

    #[test]
    fn answers_are_final() {
        let mut gateway = InMemoryGateway::new();
        let id = file(&mut gateway);
        gateway.respond_to_oversight(id, OversightDecision::Reject).unwrap();
        assert_eq!(
            gateway.respond_to_oversight(id, OversightDecision::Approve),
            Err(OversightError::AlreadyAnswered(id.0))
        );
    }

    #[test]
    fn unknown_request() {
        let mut gateway = InMemoryGateway::new();
        assert_eq!(
            gateway.respond_to_oversight(RequestId(9), OversightDecision::Approve),
            Err(OversightError::UnknownRequest(9))
        );
    }

    #[test]
    fn ids_are_sequential() {
        let mut gateway = InMemoryGateway::new();
        assert_eq!(file(&mut gateway), RequestId(1));
        assert_eq!(file(&mut gateway), RequestId(2));
    }
}
