//! Integration tests for the Aegis VM.
//!
//! Programs are either compiled from source (so the checker's annotations
//! are re-validated at run time) or written directly as bytecode text
//! (dynamic checks only).

use aegis_common::{ComplianceStatus, Criticality, ErrorCategory, Program};
use aegis_compiler::{compile, CompilationResult};
use aegis_vm::{
    execute_bytecode, CoordinationError, Coordinator, DelegationKind, DelegationRequest,
    DelegationTicket, ExecutionResult, GroupKind, ManualClock, MeasurementStatus,
    OversightDecision, OversightError, Purity, RequestId, RunOutcome, Session, VmConfig, VmState,
    FULL_STRENGTH,
};

// ============================================================
// Helpers
// ============================================================

fn compiled(source: &str) -> CompilationResult {
    let result = compile(source);
    assert!(result.success, "{:#?}", result.errors);
    result
}

fn session() -> Session {
    Session::default().with_clock(ManualClock::new())
}

/// Compile and run, answering every oversight request with `decision`.
fn run_source(source: &str, decision: OversightDecision) -> ExecutionResult {
    let c = compiled(source);
    session().run_to_completion(&c.program, Some(c.types.as_slice()), |_| decision)
}

fn bytecode(text: &str) -> Program {
    Program::from_text(text).unwrap()
}

fn categories(result: &ExecutionResult) -> Vec<ErrorCategory> {
    result.errors.iter().map(|e| e.category).collect()
}

fn console_has(result: &ExecutionResult, needle: &str) -> bool {
    result.console.iter().any(|line| line.contains(needle))
}

struct Refusing;

impl Coordinator for Refusing {
    fn delegate(
        &mut self,
        request: DelegationRequest,
    ) -> Result<DelegationTicket, CoordinationError> {
        Err(CoordinationError::Unreachable(
            request.remote_node.unwrap_or_default(),
        ))
    }
}

// ============================================================
// Resource handles
// ============================================================

#[test]
fn entangle_then_measure_leaves_one_pure_handle() {
    let result = run_source(
        "qudit a 2\nqudit b 2\nentangle a b\nmeasure a\n",
        OversightDecision::Reject,
    );
    assert!(result.success, "{:#?}", result.errors);
    assert_eq!(result.state, VmState::HaltedSuccess);
    assert_eq!(result.handles.len(), 1);

    let b = &result.handles[0];
    assert_eq!(b.handle.name, "b");
    assert_eq!(b.purity, Purity::Pure);
    assert!(b.entangled_with.is_empty());
    assert!(result.groups.is_empty());

    assert_eq!(result.classical_records.len(), 1);
    assert_eq!(result.classical_records[0].name, "a");
    assert_eq!(result.classical_records[0].released_partners, vec![b.handle.id]);
}

#[test]
fn entanglement_is_symmetric_and_breaks_cleanly() {
    let mut session = session();
    session.run(&bytecode("ALLOC_QUDIT a 2\nALLOC_QUDIT b 2\nENTANGLE a b\n"), None);
    let a = session.handle_by_name("a").unwrap().id;
    let b = session.handle_by_name("b").unwrap().id;
    assert!(session.resources().entangled_with(a).contains(&b));
    assert!(session.resources().entangled_with(b).contains(&a));

    let result = session.result();
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].kind, GroupKind::Bipartite);
    assert_eq!(result.groups[0].strength, FULL_STRENGTH);
    assert_eq!(result.groups[0].coherence_time_ms, VmConfig::default().coherence_time_ms);
    assert!(result
        .handles
        .iter()
        .all(|h| h.handle.measurement == MeasurementStatus::Unmeasured));

    let outcome = session.run(&bytecode("DISENTANGLE a b\n"), None);
    assert!(outcome.finished().unwrap().success);
    assert!(session.resources().entangled_with(a).is_empty());
    assert!(session.resources().entangled_with(b).is_empty());
    assert_eq!(session.resources().groups().count(), 0);
}

#[test]
fn measured_handle_is_gone() {
    let mut session = session();
    session.run(&bytecode("ALLOC_QUDIT a 2\n"), None);
    let id = session.handle_by_name("a").unwrap().id;

    let result = session
        .run(&bytecode("MEASURE a\nAPPLY_GATE hadamard a\nMEASURE a\n"), None)
        .finished()
        .unwrap();
    assert!(session.handle(id).is_none());
    assert_eq!(
        categories(&result),
        vec![ErrorCategory::QuantumViolation, ErrorCategory::QuantumViolation]
    );
    assert_eq!(result.errors[0].location.line, 2);
    assert_eq!(result.classical_records.len(), 1);
}

#[test]
fn redeclaring_a_handle_is_rejected() {
    let result = execute_bytecode("ALLOC_QUDIT a 2\nALLOC_QUDIT a 3\n", VmConfig::default());
    assert_eq!(categories(&result), vec![ErrorCategory::QuantumViolation]);
    assert_eq!(result.handles.len(), 1);
    assert_eq!(result.handles[0].handle.dimension, 2);
}

#[test]
fn invalid_dimension_allocates_nothing() {
    let result = execute_bytecode("ALLOC_QUDIT a 1\nALLOC_QUDIT b two\n", VmConfig::default());
    assert_eq!(
        categories(&result),
        vec![ErrorCategory::Execution, ErrorCategory::Execution]
    );
    assert!(result.handles.is_empty());
}

#[test]
fn measurement_is_reproducible_for_a_seed() {
    let config = VmConfig {
        seed: 7,
        ..VmConfig::default()
    };
    let text = "ALLOC_QUDIT a 8\nMEASURE a\nALLOC_QUDIT b 8\nMEASURE b\n";
    let first = execute_bytecode(text, config.clone());
    let second = execute_bytecode(text, config);
    let outcomes = |r: &ExecutionResult| -> Vec<u32> {
        r.classical_records.iter().map(|c| c.outcome).collect()
    };
    assert_eq!(outcomes(&first), outcomes(&second));
    assert!(first.classical_records.iter().all(|c| c.outcome < 8));
}

// ============================================================
// Decoherence
// ============================================================

fn timed_session(coherence_time_ms: u64) -> (Session, ManualClock) {
    let clock = ManualClock::new();
    let config = VmConfig {
        coherence_time_ms,
        ..VmConfig::default()
    };
    (Session::new(config).with_clock(clock.clone()), clock)
}

#[test]
fn decohered_handle_rejects_gates_and_leaks() {
    let (mut session, clock) = timed_session(100);
    session.run(&bytecode("ALLOC_QUDIT q 2\n"), None);
    clock.advance(150);

    let result = session
        .run(&bytecode("APPLY_GATE hadamard q\n"), None)
        .finished()
        .unwrap();
    assert_eq!(categories(&result), vec![ErrorCategory::Execution]);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.category == ErrorCategory::MemoryLeak));

    // Measurement of a decohered handle is still allowed.
    let result = session.run(&bytecode("MEASURE q\n"), None).finished().unwrap();
    assert!(result.success, "{:#?}", result.errors);
    assert!(result.warnings.is_empty());
}

#[test]
fn entanglement_extends_coherence() {
    let (mut session, clock) = timed_session(100);
    session.run(&bytecode("ALLOC_QUDIT a 2\nALLOC_QUDIT b 2\n"), None);
    clock.advance(80);
    session.run(&bytecode("ENTANGLE a b\n"), None);
    clock.advance(80);

    let result = session
        .run(&bytecode("APPLY_GATE hadamard a\n"), None)
        .finished()
        .unwrap();
    assert!(result.success, "{:#?}", result.errors);
}

// ============================================================
// AI governance
// ============================================================

#[test]
fn high_risk_deploy_without_oversight_fails_at_runtime() {
    let result = run_source(
        "contract bot\noversee bot none\ndeploy bot high-risk-zone\n",
        OversightDecision::Approve,
    );
    assert!(!result.success);
    assert_eq!(result.state, VmState::HaltedError);
    assert_eq!(categories(&result), vec![ErrorCategory::AiSafety]);
    assert!(result.errors[0].message.contains("no human oversight"));
    assert!(!console_has(&result, "deployed"));
    assert!(result.oversight_log.is_empty());
}

#[test]
fn high_risk_deploy_suspends_for_oversight() {
    let c = compiled("contract bot\ndeploy bot high-risk-zone\nlet x 1\nprint x\n");
    let mut session = session();

    let RunOutcome::Suspended(op) = session.run(&c.program, Some(c.types.as_slice())) else {
        panic!("expected suspension");
    };
    assert_eq!(session.state(), VmState::Suspended);
    assert_eq!(op.request.criticality, Criticality::Critical);
    assert_eq!(op.index, 1);
    // Nothing after the suspended instruction has run.
    assert!(!session.console().iter().any(|l| l == "1"));

    let result = session
        .resume(op.request.id, OversightDecision::Approve)
        .unwrap()
        .finished()
        .unwrap();
    assert!(result.success, "{:#?}", result.errors);
    assert!(console_has(&result, "deployed bot to high-risk-zone"));
    assert!(result.console.iter().any(|l| l == "1"));
    assert_eq!(
        result.oversight_log[0].decision,
        Some(OversightDecision::Approve)
    );
}

#[test]
fn rejected_oversight_fails_the_instruction_and_continues() {
    let result = run_source(
        "contract bot\ndeploy bot high_risk_lab\nlet x 1\nprint x\n",
        OversightDecision::Reject,
    );
    assert_eq!(categories(&result), vec![ErrorCategory::AiSafety]);
    assert!(!console_has(&result, "deployed"));
    assert!(result.console.iter().any(|l| l == "1"));
    assert_eq!(result.state, VmState::HaltedError);
}

#[test]
fn resume_checks_the_request() {
    let c = compiled("contract bot\ndeploy bot high-risk\n");
    let mut session = session();
    assert_eq!(
        session.resume(RequestId(1), OversightDecision::Approve),
        Err(OversightError::NotSuspended)
    );

    let RunOutcome::Suspended(op) = session.run(&c.program, Some(c.types.as_slice())) else {
        panic!("expected suspension");
    };
    let wrong = RequestId(op.request.id.0 + 100);
    assert_eq!(
        session.resume(wrong, OversightDecision::Approve),
        Err(OversightError::UnknownRequest(wrong.0))
    );
    // Still suspended on the original request.
    assert!(session.suspended().is_some());
    assert!(session
        .resume(op.request.id, OversightDecision::Reject)
        .is_ok());
}

#[test]
fn low_explainability_with_supervision_goes_to_a_human() {
    let source = "contract bot\nexplain bot 0.6\noversee bot supervision\ndecide bot allocate\n";
    let mut requests = Vec::new();
    let c = compiled(source);
    let result = session().run_to_completion(&c.program, Some(c.types.as_slice()), |request| {
        requests.push(request.clone());
        OversightDecision::Approve
    });
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation_id, "decide:4");
    assert!(result.success, "{:#?}", result.errors);
    assert!(console_has(&result, "bot decided allocate"));
}

#[test]
fn failed_verification_blocks_later_decisions() {
    let result = run_source(
        "contract bot\nexplain bot 0.5\noversee bot supervision\nverify bot\ndecide bot go\n",
        OversightDecision::Approve,
    );
    let bot = &result.entities[0];
    assert_eq!(bot.compliance, ComplianceStatus::NonCompliant);
    assert!(bot.decisions.is_empty());
    assert_eq!(categories(&result), vec![ErrorCategory::AiSafety]);
    assert_eq!(result.errors[0].location.line, 5);
    assert!(console_has(&result, "verification of bot failed"));
}

#[test]
fn passing_verification_marks_compliant() {
    let result = run_source("contract bot\nverify bot\n", OversightDecision::Reject);
    assert!(result.success);
    assert_eq!(result.entities[0].compliance, ComplianceStatus::Compliant);
}

#[test]
fn decisions_are_explained() {
    let result = run_source("contract bot\ndecide bot allocate\n", OversightDecision::Reject);
    assert!(result.success);
    assert!(console_has(&result, "explanation:"));
    assert_eq!(result.entities[0].decisions, vec!["allocate"]);
}

#[test]
fn governed_bytecode_without_contract_fails() {
    let result = execute_bytecode("DEPLOY ghost staging\n", VmConfig::default());
    assert_eq!(categories(&result), vec![ErrorCategory::AiSafety]);
}

const HIGH_WITHOUT_OVERSIGHT: &str = "DECLARE_CONTRACT bot\nSET_CRITICALITY bot high\nSET_OVERSIGHT bot none\nDEPLOY bot staging\nDECIDE bot launch\n";

#[test]
fn high_criticality_without_oversight_is_stopped_before_dispatch() {
    let result = execute_bytecode(HIGH_WITHOUT_OVERSIGHT, VmConfig::default());
    assert_eq!(
        categories(&result),
        vec![ErrorCategory::AiSafety, ErrorCategory::AiSafety]
    );
    assert_eq!(result.errors[0].location.line, 4);
    assert_eq!(result.errors[1].location.line, 5);
    assert!(result.errors[0]
        .message
        .contains("classified high but its oversight level is none"));
    assert!(!console_has(&result, "deployed"));
    assert!(!console_has(&result, "decided"));
    assert!(result.entities[0].deployments.is_empty());
    assert!(result.entities[0].decisions.is_empty());
    assert!(result.oversight_log.is_empty());
}

#[test]
fn high_criticality_without_oversight_is_stopped_in_a_session() {
    let result = session().run_to_completion(&bytecode(HIGH_WITHOUT_OVERSIGHT), None, |_| {
        OversightDecision::Approve
    });
    assert_eq!(result.state, VmState::HaltedError);
    assert!(result.oversight_log.is_empty());
    assert!(result.entities[0].deployments.is_empty());
    assert!(result.entities[0].decisions.is_empty());
}

#[test]
fn high_criticality_with_notification_goes_to_a_human() {
    let text = "DECLARE_CONTRACT bot\nSET_CRITICALITY bot high\nDEPLOY bot staging\nDECIDE bot launch\n";

    let approved = session().run_to_completion(&bytecode(text), None, |_| OversightDecision::Approve);
    assert!(approved.success, "{:#?}", approved.errors);
    assert_eq!(approved.oversight_log.len(), 2);
    assert_eq!(approved.entities[0].deployments, vec!["staging"]);
    assert_eq!(approved.entities[0].decisions, vec!["launch"]);

    let rejected = session().run_to_completion(&bytecode(text), None, |_| OversightDecision::Reject);
    assert_eq!(
        categories(&rejected),
        vec![ErrorCategory::AiSafety, ErrorCategory::AiSafety]
    );
    assert!(!console_has(&rejected, "deployed"));
    assert!(rejected.entities[0].decisions.is_empty());
}

// ============================================================
// Distributed layer
// ============================================================

#[test]
fn teleport_is_a_hard_move() {
    let result = execute_bytecode(
        "ALLOC_QUDIT d 2\nSET_TARGET_NODE node_b\nTELEPORT d node_b\nAPPLY_GATE x d\n",
        VmConfig::default(),
    );
    assert!(result.handles.is_empty());
    assert_eq!(result.delegations.len(), 1);
    assert_eq!(result.delegations[0].request.kind, DelegationKind::Teleport);
    assert!(console_has(&result, "delegated teleport of d to node_b"));
    assert!(!console_has(&result, "completed"));
    assert_eq!(categories(&result), vec![ErrorCategory::QuantumViolation]);
}

#[test]
fn remote_entanglement_only_delegates() {
    let result = execute_bytecode(
        "ALLOC_QUDIT c 3\nSET_CHANNEL quantum_link\nENTANGLE_REMOTE c node_b\n",
        VmConfig::default(),
    );
    assert!(result.success, "{:#?}", result.errors);
    assert_eq!(result.handles.len(), 1);
    assert!(result.groups.is_empty());
    let ticket = &result.delegations[0];
    assert_eq!(ticket.request.channel.as_deref(), Some("quantum_link"));
    assert!(ticket.detail.as_deref().unwrap().starts_with("key "));
}

#[test]
fn refused_delegation_changes_nothing() {
    let mut session = session().with_coordinator(Refusing);
    let result = session
        .run(
            &bytecode("ALLOC_QUDIT d 2\nALLOC_QUDIT e 2\nTELEPORT d mars\nENTANGLEMENT_SWAP d e\n"),
            None,
        )
        .finished()
        .unwrap();
    assert_eq!(
        categories(&result),
        vec![ErrorCategory::Execution, ErrorCategory::Execution]
    );
    assert_eq!(result.handles.len(), 2);
    assert!(result.delegations.is_empty());
    assert!(session.handle_by_name("d").is_some());
}

#[test]
fn swap_with_unknown_handle_is_a_quantum_violation() {
    let result = execute_bytecode(
        "ALLOC_QUDIT a 2\nENTANGLEMENT_SWAP a ghost\n",
        VmConfig::default(),
    );
    assert_eq!(categories(&result), vec![ErrorCategory::QuantumViolation]);
    assert!(result.delegations.is_empty());
}

#[test]
fn barriers_and_windows() {
    let result = execute_bytecode(
        "BARRIER sync 500\nSCHEDULE_WINDOW batch 100 200\nSCHEDULE_WINDOW late 300 200\n",
        VmConfig::default(),
    );
    assert_eq!(categories(&result), vec![ErrorCategory::Execution]);
    assert_eq!(result.barriers[0].participants, vec!["local"]);
    assert_eq!(result.barriers[0].deadline_ms, 500);
    assert_eq!(result.windows.len(), 1);
    assert_eq!(result.windows[0].name, "batch");
}

// ============================================================
// Runs
// ============================================================

#[test]
fn every_opcode_executes() {
    let source = r#"
        qudit a 2
        qudit b 2
        qudit c 3
        qudit d 2
        entangle a b
        apply hadamard a
        disentangle a b
        swap c d
        entangle_remote c node_b
        contract bot
        explain bot 0.9
        oversee bot approval
        classify bot high
        approve bot
        verify bot
        deploy bot staging
        decide bot allocate
        let label "demo run"
        print label
        node node_b
        channel quantum_link
        barrier sync 500
        window batch 100 200
        teleport d node_b
        measure a
        release b
        measure c
    "#;
    let result = run_source(source, OversightDecision::Approve);
    assert!(result.success, "{:#?}", result.errors);
    assert!(result.handles.is_empty());
    assert_eq!(result.delegations.len(), 3);
    assert!(result.console.iter().any(|l| l == "demo run"));
    assert!(console_has(&result, "deployed bot to staging"));
}

#[test]
fn step_limit_is_fatal() {
    let config = VmConfig {
        max_steps: 2,
        ..VmConfig::default()
    };
    let result = execute_bytecode("LET a 1\nLET b 2\nLET c 3\n", config);
    assert_eq!(result.state, VmState::HaltedError);
    assert!(result.errors[0].fatal);
    assert_eq!(result.variables.len(), 2);
}

#[test]
fn mismatched_annotations_are_ignored() {
    let c = compiled("qudit a 2\nmeasure a\n");
    let result = session()
        .run(&c.program, Some(&c.types[..1]))
        .finished()
        .unwrap();
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn print_of_unbound_variable_fails() {
    let result = execute_bytecode("PRINT missing\n", VmConfig::default());
    assert_eq!(categories(&result), vec![ErrorCategory::Execution]);
}

#[test]
fn sessions_have_distinct_ids_and_handles() {
    let a = execute_bytecode("ALLOC_QUDIT q 2\n", VmConfig::default());
    let b = execute_bytecode("ALLOC_QUDIT q 2\n", VmConfig::default());
    assert_ne!(a.session_id, b.session_id);
    assert_ne!(a.handles[0].handle.id, b.handles[0].handle.id);
}

#[test]
fn result_serializes_to_json() {
    let result = execute_bytecode("ALLOC_QUDIT a 2\nMEASURE a\n", VmConfig::default());
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["state"], "halted_success");
    assert_eq!(json["classical_records"][0]["name"], "a");

    let result = execute_bytecode(
        "ALLOC_QUDIT a 2\nALLOC_QUDIT b 2\nENTANGLE a b\n",
        VmConfig::default(),
    );
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["groups"][0]["kind"], "bipartite");
    assert_eq!(json["handles"][0]["measurement"], "unmeasured");
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_line() -> impl Strategy<Value = String> {
        let name = prop::sample::select(vec!["a", "b", "c"]);
        prop_oneof![
            name.clone().prop_map(|n| format!("ALLOC_QUDIT {n} 2")),
            (name.clone(), name.clone()).prop_map(|(x, y)| format!("ENTANGLE {x} {y}")),
            (name.clone(), name.clone()).prop_map(|(x, y)| format!("DISENTANGLE {x} {y}")),
            name.clone().prop_map(|n| format!("APPLY_GATE h {n}")),
            name.clone().prop_map(|n| format!("MEASURE {n}")),
            name.clone().prop_map(|n| format!("RELEASE {n}")),
            name.clone().prop_map(|n| format!("TELEPORT {n} far")),
            (name.clone(), name).prop_map(|(x, y)| format!("ENTANGLEMENT_SWAP {x} {y}")),
        ]
    }

    proptest! {
        /// Any sequence of resource operations leaves consistent groups:
        /// at least two members, every member live.
        #[test]
        fn groups_stay_consistent(lines in prop::collection::vec(arb_line(), 0..40)) {
            let result = execute_bytecode(&lines.join("\n"), VmConfig::default());
            prop_assert!(result.errors.iter().all(|e| !e.fatal));
            let live: Vec<_> = result.handles.iter().map(|h| h.handle.id).collect();
            for group in &result.groups {
                prop_assert!(group.participants.len() >= 2);
                prop_assert!(group.participants.iter().all(|p| live.contains(p)));
            }
            for snapshot in &result.handles {
                for partner in &snapshot.entangled_with {
                    let other = result.handles.iter().find(|h| h.handle.id == *partner);
                    prop_assert!(other.is_some_and(|o| o.entangled_with.contains(&snapshot.handle.id)));
                }
            }
        }
    }
}
