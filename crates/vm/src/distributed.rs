//! Distributed operation layer.
//!
//! Remote work is handed to a [`Coordinator`]. A successful handler only
//! means the delegation was accepted; the remote side completes it on its
//! own schedule. Every handler validates its operands before touching any
//! table.

use crate::error::{CoordinationError, RuntimeError};
use crate::resources::HandleId;
use crate::session::Session;
use aegis_common::Instruction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Raw qubits spent on establishing a key for a remote entanglement.
const KEY_QUBITS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationKind {
    RemoteEntanglement,
    Teleport,
    EntanglementSwap,
}

impl DelegationKind {
    pub fn name(&self) -> &'static str {
        match self {
            DelegationKind::RemoteEntanglement => "remote entanglement",
            DelegationKind::Teleport => "teleport",
            DelegationKind::EntanglementSwap => "entanglement swap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRequest {
    pub kind: DelegationKind,
    pub resources: Vec<String>,
    pub handles: Vec<HandleId>,
    pub local_node: String,
    pub remote_node: Option<String>,
    pub channel: Option<String>,
    pub session_id: String,
}

/// Proof that a coordinator accepted a delegation. Not a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationTicket {
    pub id: u64,
    pub request: DelegationRequest,
    /// Demonstration data attached by the local side (key fingerprint,
    /// fidelity estimate).
    pub detail: Option<String>,
}

pub trait Coordinator: Send {
    fn delegate(&mut self, request: DelegationRequest)
        -> Result<DelegationTicket, CoordinationError>;
}

/// Accepts every delegation and remembers it.
#[derive(Debug, Clone, Default)]
pub struct LoopbackCoordinator {
    next: u64,
    accepted: Vec<DelegationRequest>,
}

impl LoopbackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> &[DelegationRequest] {
        &self.accepted
    }
}

impl Coordinator for LoopbackCoordinator {
    fn delegate(
        &mut self,
        request: DelegationRequest,
    ) -> Result<DelegationTicket, CoordinationError> {
        self.next += 1;
        self.accepted.push(request.clone());
        Ok(DelegationTicket {
            id: self.next,
            request,
            detail: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    pub name: String,
    pub deadline_ms: u64,
    pub participants: Vec<String>,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionWindow {
    pub name: String,
    pub soft_ms: u64,
    pub hard_ms: u64,
    pub registered_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedState {
    pub target_node: Option<String>,
    pub channel: Option<String>,
    pub session_id: String,
    pub barriers: BTreeMap<String, Barrier>,
    pub windows: BTreeMap<String, ExecutionWindow>,
    pub delegations: Vec<DelegationTicket>,
}

impl DistributedState {
    pub fn new(session_id: String) -> Self {
        Self {
            target_node: None,
            channel: None,
            session_id,
            barriers: BTreeMap::new(),
            windows: BTreeMap::new(),
            delegations: Vec::new(),
        }
    }
}

fn parse_ms(token: &str) -> Result<u64, RuntimeError> {
    token.parse().map_err(|_| RuntimeError::InvalidDeadline {
        token: token.to_string(),
    })
}

impl Session {
    fn delegation_request(
        &self,
        kind: DelegationKind,
        resources: &[&str],
        handles: Vec<HandleId>,
        remote_node: Option<String>,
    ) -> DelegationRequest {
        DelegationRequest {
            kind,
            resources: resources.iter().map(|r| r.to_string()).collect(),
            handles,
            local_node: self.config.local_node.clone(),
            remote_node,
            channel: self.distributed.channel.clone(),
            session_id: self.distributed.session_id.clone(),
        }
    }

    fn accept_ticket(&mut self, ticket: DelegationTicket) {
        let target = ticket.request.remote_node.as_deref().unwrap_or("(unset)");
        self.console.push(format!(
            "delegated {} of {} to {} (ticket {})",
            ticket.request.kind.name(),
            ticket.request.resources.join(" and "),
            target,
            ticket.id
        ));
        debug!(ticket = ticket.id, kind = ticket.request.kind.name(), "delegation accepted");
        self.distributed.delegations.push(ticket);
    }

    pub(crate) fn exec_set_target_node(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let node = instr.arg(0);
        self.distributed.target_node = Some(node.to_string());
        self.console.push(format!("target node set to {node}"));
        Ok(())
    }

    pub(crate) fn exec_set_channel(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let channel = instr.arg(0);
        self.distributed.channel = Some(channel.to_string());
        self.console.push(format!("channel set to {channel}"));
        Ok(())
    }

    pub(crate) fn exec_entangle_remote(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (name, node) = (instr.arg(0), instr.arg(1));
        let id = self.resolve_coherent(name)?;

        let request = self.delegation_request(
            DelegationKind::RemoteEntanglement,
            &[name],
            vec![id],
            Some(node.to_string()),
        );
        let mut ticket = self.coordinator.delegate(request)?;

        let key = self
            .physics
            .key_distribution(&self.config.local_node, node, KEY_QUBITS);
        ticket.detail = Some(format!("key {} ({} bits)", key.fingerprint, key.key_bits));
        let now = self.clock.now_ms();
        if let Some(handle) = self.resources.get_mut(id) {
            handle.touch(now);
        }
        self.accept_ticket(ticket);
        Ok(())
    }

    /// A hard move: the local handle is gone once the coordinator accepts.
    pub(crate) fn exec_teleport(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (name, node) = (instr.arg(0), instr.arg(1));
        let id = self.resolve_coherent(name)?;

        let request =
            self.delegation_request(DelegationKind::Teleport, &[name], vec![id], Some(node.to_string()));
        let mut ticket = self.coordinator.delegate(request)?;

        let fidelity = self
            .physics
            .teleport_fidelity(&self.config.local_node, node);
        ticket.detail = Some(format!("fidelity {fidelity:.3}"));
        if let Some((_, destroyed)) = self.resources.remove(id) {
            for group in destroyed {
                self.console.push(format!("entanglement group {group} dissolved"));
            }
        }
        *self.usage.entry(name.to_string()).or_default() += 1;
        self.accept_ticket(ticket);
        Ok(())
    }

    pub(crate) fn exec_entanglement_swap(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (a, b) = (instr.arg(0), instr.arg(1));
        if a == b {
            return Err(RuntimeError::SelfEntanglement { name: a.to_string() });
        }
        let id_a = self.resolve(a)?;
        let id_b = self.resolve(b)?;

        let remote = self.distributed.target_node.clone();
        let request = self.delegation_request(
            DelegationKind::EntanglementSwap,
            &[a, b],
            vec![id_a, id_b],
            remote,
        );
        let ticket = self.coordinator.delegate(request)?;

        let now = self.clock.now_ms();
        for id in [id_a, id_b] {
            if let Some(handle) = self.resources.get_mut(id) {
                handle.touch(now);
            }
        }
        self.accept_ticket(ticket);
        Ok(())
    }

    pub(crate) fn exec_barrier(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let deadline_ms = parse_ms(instr.arg(1))?;
        let barrier = Barrier {
            name: name.to_string(),
            deadline_ms,
            participants: vec![self.config.local_node.clone()],
            created_at_ms: self.clock.now_ms(),
        };
        self.distributed.barriers.insert(name.to_string(), barrier);
        self.console
            .push(format!("barrier {name} registered (deadline {deadline_ms}ms)"));
        Ok(())
    }

    pub(crate) fn exec_schedule_window(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let soft_ms = parse_ms(instr.arg(1))?;
        let hard_ms = parse_ms(instr.arg(2))?;
        if soft_ms > hard_ms {
            return Err(RuntimeError::InvertedWindow {
                name: name.to_string(),
                soft_ms,
                hard_ms,
            });
        }
        let window = ExecutionWindow {
            name: name.to_string(),
            soft_ms,
            hard_ms,
            registered_at_ms: self.clock.now_ms(),
        };
        self.distributed.windows.insert(name.to_string(), window);
        self.console
            .push(format!("window {name} scheduled (soft {soft_ms}ms, hard {hard_ms}ms)"));
        Ok(())
    }
}
