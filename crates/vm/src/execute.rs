//! Per-instruction cycle and opcode dispatch.
//!
//! Each instruction goes through: decoherence timers, `Pre` constraints,
//! the verification gate, the handler, then `Post` checks. A failure is
//! recorded against the instruction's location and the run moves on.

use crate::entities::AiEntity;
use crate::error::RuntimeError;
use crate::oversight::{OversightLogEntry, OversightRequest};
use crate::resources::{ClassicalRecord, Coherence, HandleId, MeasurementStatus, ResourceHandle};
use crate::session::{Session, Step, SuspendedOperation};
use crate::verification::{classify_operation, OperationProfile};
use aegis_checker::{CheckPhase, Constraint};
use aegis_common::{
    ComplianceStatus, Criticality, Diagnostic, ErrorCategory, Instruction, Opcode, OversightLevel,
    SourceLocation, Value,
};
use tracing::{debug, warn};

/// Result of the verification gate.
enum Gate {
    Open,
    Closed(RuntimeError),
    Review(OversightRequest),
}

/// Resource names an instruction interacts with without consuming them.
fn interaction_operands(instr: &Instruction) -> Vec<&str> {
    match instr.opcode {
        Opcode::Entangle | Opcode::Disentangle | Opcode::EntanglementSwap => {
            vec![instr.arg(0), instr.arg(1)]
        }
        Opcode::ApplyGate => vec![instr.arg(1)],
        Opcode::EntangleRemote => vec![instr.arg(0)],
        Opcode::AllocQudit
        | Opcode::Measure
        | Opcode::Release
        | Opcode::Teleport
        | Opcode::DeclareContract
        | Opcode::SetExplainability
        | Opcode::SetOversight
        | Opcode::SetCriticality
        | Opcode::Approve
        | Opcode::Deploy
        | Opcode::Verify
        | Opcode::Decide
        | Opcode::Let
        | Opcode::Print
        | Opcode::SetTargetNode
        | Opcode::SetChannel
        | Opcode::Barrier
        | Opcode::ScheduleWindow => Vec::new(),
    }
}

fn describe(instr: &Instruction) -> String {
    match instr.opcode {
        Opcode::Deploy => format!("deploy '{}' to '{}'", instr.arg(0), instr.arg(1)),
        Opcode::Decide => format!("decision '{}' by '{}'", instr.arg(1), instr.arg(0)),
        _ => instr.to_string(),
    }
}

impl Session {
    pub(crate) fn step(&mut self, index: usize) -> Step {
        let instr = self.program.instructions[index].clone();
        self.fire_timers();
        debug!(
            pc = index,
            opcode = instr.opcode.mnemonic(),
            handler = instr.opcode.handler_name(),
            "dispatch"
        );

        if !self.validate(index, CheckPhase::Pre, instr.location) {
            return Step::Next;
        }

        let profile = classify_operation(&instr, &self.entities, &self.config);
        if profile.kind.is_gated() {
            match self.gate(&instr, &profile) {
                Gate::Open => {}
                Gate::Closed(error) => {
                    self.record(error, instr.location);
                    return Step::Next;
                }
                Gate::Review(request) => {
                    return Step::Suspend(SuspendedOperation {
                        request,
                        instruction: instr,
                        index,
                    })
                }
            }
        }

        self.complete(index, &instr, false);
        Step::Next
    }

    /// Run the handler and the post-checks of an instruction that passed
    /// the gate, or was approved by a human when `approved` is set.
    pub(crate) fn complete(&mut self, index: usize, instr: &Instruction, approved: bool) {
        match self.dispatch(instr) {
            Ok(()) => {
                self.validate(index, CheckPhase::Post, instr.location);
                self.post_checks(instr, approved);
            }
            Err(error) => self.record(error, instr.location),
        }
    }

    /// Mark every handle whose deadline has passed as decoherent.
    pub(crate) fn fire_timers(&mut self) {
        let now = self.clock.now_ms();
        for handle in self.resources.handles_mut() {
            if handle.coherence == Coherence::Coherent && now >= handle.coherence_deadline_ms {
                handle.coherence = Coherence::Decoherent;
                warn!(handle = %handle.id, name = %handle.name, "decohered");
            }
        }
    }

    /// Evaluate the annotated constraints of `phase`. Returns false when a
    /// required constraint failed.
    fn validate(&mut self, index: usize, phase: CheckPhase, location: SourceLocation) -> bool {
        let Some(ty) = self.annotations.as_ref().and_then(|types| types.get(index)) else {
            return true;
        };
        let mut passed = true;
        let mut findings = Vec::new();
        for constraint in ty.constraints_in(phase) {
            if let Err(violation) = constraint.evaluate(&*self) {
                passed &= !constraint.required;
                findings.push(violation.into_diagnostic(location, constraint.required));
            }
        }
        for finding in findings {
            self.diagnostics.push(finding);
        }
        passed
    }

    fn gate(&mut self, instr: &Instruction, profile: &OperationProfile) -> Gate {
        let entity = profile.entity.as_deref().and_then(|n| self.entities.get(n));
        let outcome = self.verifier.evaluate(profile, entity);
        if outcome.passed {
            return Gate::Open;
        }

        let operation = describe(instr);
        let oversight = entity.map(|e| e.oversight);
        match oversight {
            Some(level) if outcome.requires_oversight && level != OversightLevel::None => {
                let operation_id = format!("{}:{}", instr.opcode.keyword(), instr.location.line);
                let details = format!("{operation}: {}", outcome.reasons.join("; "));
                let id = self.gateway.request_oversight(
                    &operation_id,
                    profile.kind,
                    profile.criticality,
                    &details,
                    level,
                );
                let request = OversightRequest {
                    id,
                    operation_id,
                    kind: profile.kind,
                    criticality: profile.criticality,
                    details,
                    level,
                };
                self.console
                    .push(format!("oversight {id} requested: {operation}"));
                self.oversight_log.push(OversightLogEntry {
                    request: request.clone(),
                    decision: None,
                });
                Gate::Review(request)
            }
            _ => {
                let mut reasons = outcome.reasons;
                if outcome.requires_oversight {
                    if let Some(name) = &profile.entity {
                        reasons.push(format!("'{name}' has no human oversight"));
                    }
                }
                Gate::Closed(RuntimeError::VerificationFailed {
                    operation,
                    reasons: reasons.join("; "),
                })
            }
        }
    }

    fn post_checks(&mut self, instr: &Instruction, approved: bool) {
        let now = self.clock.now_ms();
        for name in interaction_operands(instr) {
            let decayed = self
                .handle_by_name(name)
                .is_some_and(|h| !h.is_coherent_at(now));
            if decayed {
                self.diagnostics.push(
                    Diagnostic::warning(
                        ErrorCategory::QuantumViolation,
                        instr.location,
                        format!(
                            "resource '{name}' lost coherence during {}",
                            instr.opcode.keyword()
                        ),
                    )
                    .with_suggestion(format!("measure or release '{name}' soon")),
                );
            }
        }

        // A human approval of this very instruction satisfies the oversight rule.
        if !approved && matches!(instr.opcode, Opcode::Deploy | Opcode::Decide) {
            let check = Constraint::human_oversight(instr.arg(0), CheckPhase::Post);
            if let Err(violation) = check.evaluate(&*self) {
                self.diagnostics
                    .push(violation.into_diagnostic(instr.location, true));
            }
        }
    }

    pub(crate) fn dispatch(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        match instr.opcode {
            // Resource handles
            Opcode::AllocQudit => self.exec_alloc_qudit(instr),
            Opcode::Entangle => self.exec_entangle(instr),
            Opcode::Disentangle => self.exec_disentangle(instr),
            Opcode::ApplyGate => self.exec_apply_gate(instr),
            Opcode::Measure => self.exec_measure(instr),
            Opcode::Release => self.exec_release(instr),

            // AI governance
            Opcode::DeclareContract => self.exec_declare_contract(instr),
            Opcode::SetExplainability => self.exec_set_explainability(instr),
            Opcode::SetOversight => self.exec_set_oversight(instr),
            Opcode::SetCriticality => self.exec_set_criticality(instr),
            Opcode::Approve => self.exec_approve(instr),
            Opcode::Deploy => self.exec_deploy(instr),
            Opcode::Verify => self.exec_verify(instr),
            Opcode::Decide => self.exec_decide(instr),

            // Classical values
            Opcode::Let => self.exec_let(instr),
            Opcode::Print => self.exec_print(instr),

            // Distributed
            Opcode::SetTargetNode => self.exec_set_target_node(instr),
            Opcode::SetChannel => self.exec_set_channel(instr),
            Opcode::EntangleRemote => self.exec_entangle_remote(instr),
            Opcode::Teleport => self.exec_teleport(instr),
            Opcode::EntanglementSwap => self.exec_entanglement_swap(instr),
            Opcode::Barrier => self.exec_barrier(instr),
            Opcode::ScheduleWindow => self.exec_schedule_window(instr),
        }
    }

    // ---- Resource helpers ----

    /// The live handle bound to `name`.
    pub(crate) fn resolve(&self, name: &str) -> Result<HandleId, RuntimeError> {
        let Some(&id) = self.bindings.get(name) else {
            return Err(RuntimeError::UnknownHandle {
                name: name.to_string(),
            });
        };
        if self.usage.get(name).copied().unwrap_or(0) > 0 || !self.resources.contains(id) {
            return Err(RuntimeError::ConsumedHandle {
                name: name.to_string(),
            });
        }
        Ok(id)
    }

    /// Like [`Session::resolve`], and the handle must still be coherent.
    pub(crate) fn resolve_coherent(&self, name: &str) -> Result<HandleId, RuntimeError> {
        let id = self.resolve(name)?;
        let now = self.clock.now_ms();
        match self.resources.get(id) {
            Some(handle) if handle.is_coherent_at(now) => Ok(id),
            _ => Err(RuntimeError::Decoherent {
                name: name.to_string(),
            }),
        }
    }

    fn consume(&mut self, name: &str, id: HandleId) -> Result<ResourceHandle, RuntimeError> {
        let (handle, destroyed) =
            self.resources
                .remove(id)
                .ok_or_else(|| RuntimeError::ConsumedHandle {
                    name: name.to_string(),
                })?;
        *self.usage.entry(name.to_string()).or_default() += 1;
        for group in destroyed {
            self.console
                .push(format!("entanglement group {group} dissolved"));
        }
        Ok(handle)
    }

    // ---- Resource handlers ----

    fn exec_alloc_qudit(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (name, token) = (instr.arg(0), instr.arg(1));
        if self.bindings.contains_key(name) {
            return Err(RuntimeError::AlreadyBound {
                name: name.to_string(),
            });
        }
        let dimension = token
            .parse::<u32>()
            .ok()
            .filter(|&d| d >= 2)
            .ok_or_else(|| RuntimeError::InvalidDimension {
                token: token.to_string(),
            })?;

        let handle = ResourceHandle::new(
            name,
            dimension,
            self.clock.now_ms(),
            self.config.coherence_time_ms,
        );
        let id = self.resources.insert(handle);
        self.bindings.insert(name.to_string(), id);
        self.console
            .push(format!("allocated qudit {name} (dimension {dimension}) as {id}"));
        Ok(())
    }

    fn exec_entangle(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (a, b) = (instr.arg(0), instr.arg(1));
        if a == b {
            return Err(RuntimeError::SelfEntanglement { name: a.to_string() });
        }
        let id_a = self.resolve_coherent(a)?;
        let id_b = self.resolve_coherent(b)?;
        if self.resources.group_between(id_a, id_b).is_some() {
            return Err(RuntimeError::AlreadyEntangled {
                a: a.to_string(),
                b: b.to_string(),
            });
        }

        let now = self.clock.now_ms();
        let group =
            self.resources
                .create_group(vec![id_a, id_b], now, self.config.coherence_time_ms);
        for id in [id_a, id_b] {
            if let Some(handle) = self.resources.get_mut(id) {
                handle.reset_deadline(now, self.config.coherence_time_ms);
            }
        }
        self.entangled_names.insert(a.to_string());
        self.entangled_names.insert(b.to_string());
        self.console
            .push(format!("entangled {a} and {b} in group {group}"));
        Ok(())
    }

    fn exec_disentangle(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (a, b) = (instr.arg(0), instr.arg(1));
        let id_a = self.resolve(a)?;
        let id_b = self.resolve(b)?;
        let group = self
            .resources
            .group_between(id_a, id_b)
            .ok_or_else(|| RuntimeError::NotEntangled {
                a: a.to_string(),
                b: b.to_string(),
            })?;

        self.resources.remove_group(group);
        let now = self.clock.now_ms();
        for id in [id_a, id_b] {
            if let Some(handle) = self.resources.get_mut(id) {
                handle.touch(now);
            }
        }
        self.console
            .push(format!("disentangled {a} and {b} (group {group} removed)"));
        Ok(())
    }

    fn exec_apply_gate(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (gate, name) = (instr.arg(0), instr.arg(1));
        let id = self.resolve_coherent(name)?;
        let now = self.clock.now_ms();
        if let Some(handle) = self.resources.get_mut(id) {
            handle.gates.push(gate.to_string());
            handle.touch(now);
        }
        self.console.push(format!("applied {gate} to {name}"));
        Ok(())
    }

    /// Collapse a handle. Decoherent handles may still be measured.
    fn exec_measure(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let id = self.resolve(name)?;
        let released_partners: Vec<HandleId> =
            self.resources.entangled_with(id).into_iter().collect();
        let dimension = self
            .resources
            .get(id)
            .map(|h| h.dimension)
            .unwrap_or_default();

        let measurement = self.physics.measure(dimension);
        let mut handle = self.consume(name, id)?;
        handle.measurement = MeasurementStatus::Measured;
        debug!(handle = %handle.id, gates = handle.gates.len(), "collapsed");
        self.classical_records.push(ClassicalRecord {
            name: name.to_string(),
            handle: id,
            dimension: handle.dimension,
            outcome: measurement.outcome,
            probability: measurement.probability,
            measured_at_ms: self.clock.now_ms(),
            released_partners,
        });
        self.console.push(format!(
            "measured {name}: outcome {} (p={:.3})",
            measurement.outcome, measurement.probability
        ));
        Ok(())
    }

    fn exec_release(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let id = self.resolve(name)?;
        self.consume(name, id)?;
        self.console.push(format!("released {name}"));
        Ok(())
    }

    // ---- Governance handlers ----

    fn entity_mut(&mut self, name: &str) -> Result<&mut AiEntity, RuntimeError> {
        self.entities
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownEntity {
                name: name.to_string(),
            })
    }

    fn exec_declare_contract(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        if self.entities.contains_key(name) {
            return Err(RuntimeError::EntityExists {
                name: name.to_string(),
            });
        }
        self.entities.insert(name.to_string(), AiEntity::new(name));
        self.console.push(format!("declared contract {name}"));
        Ok(())
    }

    fn exec_set_explainability(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (name, token) = (instr.arg(0), instr.arg(1));
        let score = token
            .parse::<f64>()
            .ok()
            .filter(|s| (0.0..=1.0).contains(s))
            .ok_or_else(|| RuntimeError::InvalidScore {
                token: token.to_string(),
            })?;
        self.entity_mut(name)?.explainability = score;
        self.console
            .push(format!("{name} explainability set to {score}"));
        Ok(())
    }

    fn exec_set_oversight(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let level: OversightLevel =
            instr
                .arg(1)
                .parse()
                .map_err(|e: aegis_common::UnknownLevel| RuntimeError::InvalidLevel {
                    kind: e.kind,
                    token: e.token,
                })?;
        self.entity_mut(name)?.oversight = level;
        self.console.push(format!("{name} oversight set to {level}"));
        Ok(())
    }

    fn exec_set_criticality(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let level: Criticality =
            instr
                .arg(1)
                .parse()
                .map_err(|e: aegis_common::UnknownLevel| RuntimeError::InvalidLevel {
                    kind: e.kind,
                    token: e.token,
                })?;
        self.entity_mut(name)?.criticality = level;
        self.console.push(format!("{name} criticality set to {level}"));
        Ok(())
    }

    fn exec_approve(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        self.entity_mut(name)?.approved = true;
        self.console.push(format!("{name} approved"));
        Ok(())
    }

    fn exec_deploy(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (name, target) = (instr.arg(0), instr.arg(1));
        self.entity_mut(name)?.deployments.push(target.to_string());
        self.console.push(format!("deployed {name} to {target}"));
        Ok(())
    }

    /// Marks the entity compliant or non-compliant. A failed verification
    /// is a warning here; later governed actions are what it blocks.
    fn exec_verify(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let profile = classify_operation(instr, &self.entities, &self.config);
        let entity = self
            .entities
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownEntity {
                name: name.to_string(),
            })?;
        let outcome = self.verifier.evaluate(&profile, Some(entity));
        let summary = self
            .explanations
            .summarize_verification(name, outcome.passed, &outcome.reasons);

        self.entity_mut(name)?.compliance = if outcome.passed {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        };
        if !outcome.passed {
            self.diagnostics.push(Diagnostic::warning(
                ErrorCategory::AiSafety,
                instr.location,
                format!(
                    "verification of '{name}' failed: {}",
                    outcome.reasons.join("; ")
                ),
            ));
        }
        let verdict = if outcome.passed { "passed" } else { "failed" };
        self.console
            .push(format!("verification of {name} {verdict} ({summary})"));
        Ok(())
    }

    fn exec_decide(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let (name, action) = (instr.arg(0), instr.arg(1));
        let entity = self
            .entities
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownEntity {
                name: name.to_string(),
            })?;
        let explanation = self.explanations.explain_decision(name, action);
        entity.decisions.push(action.to_string());
        self.console
            .push(format!("{name} decided {action}: {}", explanation.summary));
        Ok(())
    }

    // ---- Classical values ----

    fn exec_let(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let value = Value::parse_literal(instr.arg(1));
        self.variables.insert(instr.arg(0).to_string(), value);
        Ok(())
    }

    fn exec_print(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        let name = instr.arg(0);
        let value = self
            .variables
            .get(name)
            .ok_or_else(|| RuntimeError::UnboundVariable {
                name: name.to_string(),
            })?;
        self.console.push(value.to_string());
        Ok(())
    }
}
