//! Interpreter session: state, lifecycle and results.

use crate::clock::{Clock, SystemClock};
use crate::config::VmConfig;
use crate::distributed::{
    Barrier, Coordinator, DelegationTicket, DistributedState, ExecutionWindow, LoopbackCoordinator,
};
use crate::entities::{AiEntity, EntityTable};
use crate::error::{OversightError, RuntimeError};
use crate::explain::ExplanationService;
use crate::oversight::{
    InMemoryGateway, OversightDecision, OversightGateway, OversightLogEntry, OversightRequest,
    RequestId,
};
use crate::physics::{DemoPhysics, PhysicsStub};
use crate::resources::{
    ClassicalRecord, EntanglementGroup, HandleId, Purity, ResourceHandle, ResourceTable,
};
use crate::verification::Verifier;
use aegis_checker::{ConstraintContext, EntityView, InferredType};
use aegis_common::{
    Diagnostic, Diagnostics, ErrorCategory, Instruction, Program, SourceLocation, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    NotStarted,
    Running,
    /// Waiting for an oversight decision.
    Suspended,
    HaltedSuccess,
    HaltedError,
}

/// An instruction whose completion waits on a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendedOperation {
    pub request: OversightRequest,
    pub instruction: Instruction,
    /// Position of the instruction in the program.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunOutcome {
    Finished(ExecutionResult),
    Suspended(SuspendedOperation),
}

impl RunOutcome {
    pub fn finished(self) -> Option<ExecutionResult> {
        match self {
            RunOutcome::Finished(result) => Some(result),
            RunOutcome::Suspended(_) => None,
        }
    }
}

/// A live handle as reported in results, with its derived entanglement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleSnapshot {
    #[serde(flatten)]
    pub handle: ResourceHandle,
    pub purity: Purity,
    pub entangled_with: Vec<HandleId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub state: VmState,
    pub console: Vec<String>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub handles: Vec<HandleSnapshot>,
    pub groups: Vec<EntanglementGroup>,
    pub entities: Vec<AiEntity>,
    pub variables: BTreeMap<String, Value>,
    pub classical_records: Vec<ClassicalRecord>,
    pub delegations: Vec<DelegationTicket>,
    pub barriers: Vec<Barrier>,
    pub windows: Vec<ExecutionWindow>,
    pub oversight_log: Vec<OversightLogEntry>,
    pub session_id: String,
}

pub(crate) enum Step {
    Next,
    Suspend(SuspendedOperation),
}

/// One interpreter. Tables are owned by the session and persist across
/// runs; console output and diagnostics are per run.
pub struct Session {
    pub(crate) config: VmConfig,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) physics: Box<dyn PhysicsStub>,
    pub(crate) gateway: Box<dyn OversightGateway>,
    pub(crate) coordinator: Box<dyn Coordinator>,
    pub(crate) explanations: ExplanationService,
    pub(crate) verifier: Verifier,
    pub(crate) state: VmState,
    pub(crate) program: Program,
    pub(crate) annotations: Option<Vec<InferredType>>,
    pub(crate) pc: usize,
    pub(crate) steps: usize,
    pub(crate) suspended: Option<SuspendedOperation>,
    pub(crate) resources: ResourceTable,
    /// Name → handle, kept after the handle is consumed.
    pub(crate) bindings: BTreeMap<String, HandleId>,
    /// Consuming uses per name.
    pub(crate) usage: BTreeMap<String, usize>,
    pub(crate) entangled_names: BTreeSet<String>,
    pub(crate) entities: EntityTable,
    pub(crate) variables: BTreeMap<String, Value>,
    pub(crate) classical_records: Vec<ClassicalRecord>,
    pub(crate) distributed: DistributedState,
    pub(crate) console: Vec<String>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) oversight_log: Vec<OversightLogEntry>,
}

impl Session {
    pub fn new(config: VmConfig) -> Self {
        let session_id = format!("session-{}", NEXT_SESSION.fetch_add(1, Ordering::Relaxed));
        Self {
            physics: Box::new(DemoPhysics::new(config.seed)),
            clock: Box::new(SystemClock::new()),
            gateway: Box::new(InMemoryGateway::new()),
            coordinator: Box::new(LoopbackCoordinator::new()),
            explanations: ExplanationService::default(),
            verifier: Verifier,
            state: VmState::NotStarted,
            program: Program::default(),
            annotations: None,
            pc: 0,
            steps: 0,
            suspended: None,
            resources: ResourceTable::new(),
            bindings: BTreeMap::new(),
            usage: BTreeMap::new(),
            entangled_names: BTreeSet::new(),
            entities: EntityTable::new(),
            variables: BTreeMap::new(),
            classical_records: Vec::new(),
            distributed: DistributedState::new(session_id),
            console: Vec::new(),
            diagnostics: Diagnostics::new(),
            oversight_log: Vec::new(),
            config,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_physics(mut self, physics: impl PhysicsStub + 'static) -> Self {
        self.physics = Box::new(physics);
        self
    }

    pub fn with_gateway(mut self, gateway: impl OversightGateway + 'static) -> Self {
        self.gateway = Box::new(gateway);
        self
    }

    pub fn with_coordinator(mut self, coordinator: impl Coordinator + 'static) -> Self {
        self.coordinator = Box::new(coordinator);
        self
    }

    pub fn with_explanations(mut self, explanations: ExplanationService) -> Self {
        self.explanations = explanations;
        self
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.distributed.session_id
    }

    pub fn console(&self) -> &[String] {
        &self.console
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// The live handle bound to `name`, if it has not been consumed.
    pub fn handle_by_name(&self, name: &str) -> Option<&ResourceHandle> {
        self.bindings
            .get(name)
            .and_then(|&id| self.resources.get(id))
    }

    pub fn handle(&self, id: HandleId) -> Option<&ResourceHandle> {
        self.resources.get(id)
    }

    pub fn ai_entity(&self, name: &str) -> Option<&AiEntity> {
        self.entities.get(name)
    }

    pub fn distributed(&self) -> &DistributedState {
        &self.distributed
    }

    pub fn classical_records(&self) -> &[ClassicalRecord] {
        &self.classical_records
    }

    pub fn suspended(&self) -> Option<&SuspendedOperation> {
        self.suspended.as_ref()
    }

    /// Run `program` from the start.
    ///
    /// `annotations` are the checker's types, one per instruction. When
    /// present, their `Pre` and `Post` constraints are re-evaluated around
    /// each instruction; without them only the handlers' own checks apply.
    pub fn run(&mut self, program: &Program, annotations: Option<&[InferredType]>) -> RunOutcome {
        info!(
            session = %self.distributed.session_id,
            instructions = program.len(),
            annotated = annotations.is_some(),
            "run started"
        );
        self.program = program.clone();
        self.console.clear();
        self.diagnostics = Diagnostics::new();
        self.pc = 0;
        self.steps = 0;
        self.suspended = None;
        self.annotations = match annotations {
            Some(types) if types.len() == program.len() => Some(types.to_vec()),
            Some(types) => {
                self.diagnostics.push(Diagnostic::warning(
                    ErrorCategory::Execution,
                    SourceLocation::default(),
                    format!(
                        "ignoring {} annotations for {} instructions",
                        types.len(),
                        program.len()
                    ),
                ));
                None
            }
            None => None,
        };
        self.state = VmState::Running;
        self.drive()
    }

    /// Answer the pending oversight request and continue the run.
    pub fn resume(
        &mut self,
        request_id: RequestId,
        decision: OversightDecision,
    ) -> Result<RunOutcome, OversightError> {
        let Some(op) = self.suspended.take() else {
            return Err(OversightError::NotSuspended);
        };
        if op.request.id != request_id {
            self.suspended = Some(op);
            return Err(OversightError::UnknownRequest(request_id.0));
        }
        if let Err(e) = self.gateway.respond_to_oversight(request_id, decision) {
            self.suspended = Some(op);
            return Err(e);
        }
        if let Some(entry) = self
            .oversight_log
            .iter_mut()
            .rev()
            .find(|entry| entry.request.id == request_id)
        {
            entry.decision = Some(decision);
        }
        info!(request = %request_id, ?decision, "oversight answered");

        self.state = VmState::Running;
        match decision {
            OversightDecision::Approve => {
                self.console.push(format!(
                    "oversight {request_id} approved: {}",
                    op.request.details
                ));
                self.complete(op.index, &op.instruction, true);
            }
            OversightDecision::Reject => self.record(
                RuntimeError::OversightRejected {
                    request: request_id.0,
                    operation: op.request.details.clone(),
                },
                op.instruction.location,
            ),
        }
        self.pc = op.index + 1;
        Ok(self.drive())
    }

    /// Run to the end, answering every oversight request with `decide`.
    pub fn run_to_completion(
        &mut self,
        program: &Program,
        annotations: Option<&[InferredType]>,
        mut decide: impl FnMut(&OversightRequest) -> OversightDecision,
    ) -> ExecutionResult {
        let mut outcome = self.run(program, annotations);
        loop {
            match outcome {
                RunOutcome::Finished(result) => return result,
                RunOutcome::Suspended(op) => {
                    let decision = decide(&op.request);
                    outcome = match self.resume(op.request.id, decision) {
                        Ok(next) => next,
                        Err(e) => {
                            self.suspended = None;
                            self.diagnostics.push(Diagnostic::error(
                                ErrorCategory::Execution,
                                op.instruction.location,
                                e.to_string(),
                            ));
                            self.pc = op.index + 1;
                            self.state = VmState::Running;
                            self.drive()
                        }
                    };
                }
            }
        }
    }

    /// Halt immediately on input that cannot be run at all.
    pub(crate) fn reject_input(&mut self, error: RuntimeError, location: SourceLocation) -> ExecutionResult {
        self.record(error, location);
        self.state = VmState::HaltedError;
        self.result()
    }

    pub(crate) fn drive(&mut self) -> RunOutcome {
        while self.pc < self.program.len() {
            self.steps += 1;
            let location = self.program.instructions[self.pc].location;
            if self.steps > self.config.max_steps {
                self.record(
                    RuntimeError::IterationLimit {
                        limit: self.config.max_steps,
                    },
                    location,
                );
                return self.halt();
            }

            match self.step(self.pc) {
                Step::Next => self.pc += 1,
                Step::Suspend(op) => {
                    warn!(
                        request = %op.request.id,
                        operation = %op.request.operation_id,
                        criticality = op.request.criticality.name(),
                        "suspended for oversight"
                    );
                    self.state = VmState::Suspended;
                    self.suspended = Some(op.clone());
                    return RunOutcome::Suspended(op);
                }
            }
            if self.diagnostics.has_fatal() {
                return self.halt();
            }
        }
        self.final_scan();
        self.halt()
    }

    fn halt(&mut self) -> RunOutcome {
        self.state = if self.diagnostics.has_errors() {
            VmState::HaltedError
        } else {
            VmState::HaltedSuccess
        };
        info!(
            session = %self.distributed.session_id,
            state = ?self.state,
            errors = self.diagnostics.errors.len(),
            warnings = self.diagnostics.warnings.len(),
            "run finished"
        );
        RunOutcome::Finished(self.result())
    }

    /// Leak and consistency scan of the live tables.
    fn final_scan(&mut self) {
        self.fire_timers();
        let location = self
            .program
            .instructions
            .last()
            .map(|i| i.location)
            .unwrap_or_default();

        let leaked: Vec<String> = self
            .resources
            .handles()
            .filter(|h| !h.is_coherent_at(self.clock.now_ms()))
            .map(|h| h.name.clone())
            .collect();
        for name in leaked {
            self.record(RuntimeError::DecoheredLeak { name }, location);
        }

        for (group, detail) in self.resources.inconsistencies() {
            self.record(
                RuntimeError::InconsistentGroup {
                    group: group.0,
                    detail,
                },
                location,
            );
        }
    }

    pub(crate) fn record(&mut self, error: RuntimeError, location: SourceLocation) {
        debug!(category = error.category().name(), %error, "recorded");
        self.diagnostics.push(error.into_diagnostic(location));
    }

    pub fn result(&self) -> ExecutionResult {
        ExecutionResult {
            success: !self.diagnostics.has_errors(),
            state: self.state,
            console: self.console.clone(),
            errors: self.diagnostics.errors.clone(),
            warnings: self.diagnostics.warnings.clone(),
            handles: self
                .resources
                .handles()
                .map(|h| HandleSnapshot {
                    handle: h.clone(),
                    purity: self.resources.purity(h.id),
                    entangled_with: self.resources.entangled_with(h.id).into_iter().collect(),
                })
                .collect(),
            groups: self.resources.groups().cloned().collect(),
            entities: self.entities.values().cloned().collect(),
            variables: self.variables.clone(),
            classical_records: self.classical_records.clone(),
            delegations: self.distributed.delegations.clone(),
            barriers: self.distributed.barriers.values().cloned().collect(),
            windows: self.distributed.windows.values().cloned().collect(),
            oversight_log: self.oversight_log.clone(),
            session_id: self.distributed.session_id.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl ConstraintContext for Session {
    fn consumed_count(&self, resource: &str) -> usize {
        self.usage.get(resource).copied().unwrap_or(0)
    }

    fn is_tracked(&self, resource: &str) -> bool {
        self.handle_by_name(resource).is_some()
    }

    fn is_coherent(&self, resource: &str) -> bool {
        let now = self.clock.now_ms();
        self.handle_by_name(resource)
            .is_some_and(|h| h.is_coherent_at(now))
    }

    fn was_entangled(&self, resource: &str) -> bool {
        self.entangled_names.contains(resource)
    }

    fn entity(&self, name: &str) -> Option<EntityView> {
        self.entities.get(name).map(AiEntity::view)
    }
}
