//! Aegis virtual machine: executes checked bytecode.
//!
//! A [`Session`] owns one interpreter:
//! - a live table of qudit handles and the entanglement groups over them
//! - the AI entities known to the session
//! - classical variables and measurement records
//! - distributed state (target node, channel, barriers, windows, delegations)
//!
//! Collaborators (clock, physics, oversight gateway, coordinator,
//! explanation provider) are traits supplied at construction.
//!
//! Errors are accumulated per instruction; a run succeeds when none were
//! recorded. Only malformed input, the step limit and a failed final
//! consistency scan abort a run.
//!
//! # Usage
//!
//! ```
//! use aegis_vm::{execute_bytecode, VmConfig, VmState};
//!
//! let result = execute_bytecode("ALLOC_QUDIT a 2\nMEASURE a\n", VmConfig::default());
//! assert!(result.success);
//! assert_eq!(result.state, VmState::HaltedSuccess);
//! assert_eq!(result.classical_records.len(), 1);
//! ```

pub mod clock;
pub mod config;
pub mod distributed;
pub mod entities;
pub mod error;
pub mod execute;
pub mod explain;
pub mod oversight;
pub mod physics;
pub mod resources;
pub mod session;
pub mod verification;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VmConfig;
pub use distributed::{
    Barrier, Coordinator, DelegationKind, DelegationRequest, DelegationTicket, DistributedState,
    ExecutionWindow, LoopbackCoordinator,
};
pub use entities::{AiEntity, EntityTable};
pub use error::{CoordinationError, OversightError, ProviderError, RuntimeError};
pub use explain::{
    generate_json, Explanation, ExplanationProvider, ExplanationService, GenerationOptions,
    TemplateResponder,
};
pub use oversight::{
    InMemoryGateway, OversightDecision, OversightGateway, OversightLogEntry, OversightRequest,
    RequestId,
};
pub use physics::{DemoPhysics, KeyMaterial, Measurement, PhysicsStub};
pub use resources::{
    ClassicalRecord, Coherence, EntanglementGroup, GroupId, GroupKind, HandleId,
    MeasurementStatus, Purity, ResourceHandle, ResourceTable, FULL_STRENGTH,
};
pub use session::{ExecutionResult, HandleSnapshot, RunOutcome, Session, SuspendedOperation, VmState};
pub use verification::{classify_operation, OperationKind, OperationProfile, Verifier, VerificationOutcome};

use aegis_common::{DecodeError, Program, SourceLocation};

fn decode_location(error: &DecodeError) -> SourceLocation {
    let line = match error {
        DecodeError::UnknownOpcode { line, .. }
        | DecodeError::WrongArity { line, .. }
        | DecodeError::UnterminatedQuote { line } => *line,
    };
    SourceLocation::new(line, 1)
}

/// Decode bytecode text and run it without static annotations.
///
/// Oversight requests are rejected; use a [`Session`] to decide them.
pub fn execute_bytecode(text: &str, config: VmConfig) -> ExecutionResult {
    let mut session = Session::new(config);
    match Program::from_text(text) {
        Ok(program) => session.run_to_completion(&program, None, |_| OversightDecision::Reject),
        Err(e) => {
            let location = decode_location(&e);
            session.reject_input(RuntimeError::MalformedBytecode(e), location)
        }
    }
}

/// Like [`execute_bytecode`] for raw bytes, which must be UTF-8.
pub fn execute_bytecode_bytes(bytes: &[u8], config: VmConfig) -> ExecutionResult {
    match std::str::from_utf8(bytes) {
        Ok(text) => execute_bytecode(text, config),
        Err(e) => Session::new(config).reject_input(
            RuntimeError::NotText {
                offset: e.valid_up_to(),
            },
            SourceLocation::default(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_common::ErrorCategory;

    #[test]
    fn malformed_bytecode_is_fatal() {
        let result = execute_bytecode("ALLOC_QUDIT a 2\nFROB x\n", VmConfig::default());
        assert!(!result.success);
        assert_eq!(result.state, VmState::HaltedError);
        assert!(result.errors[0].fatal);
        assert_eq!(result.errors[0].location.line, 2);
        assert!(result.console.is_empty());
    }

    #[test]
    fn non_text_bytecode_is_fatal() {
        let result = execute_bytecode_bytes(&[0x41, 0xff], VmConfig::default());
        assert!(result.errors[0].fatal);
        assert_eq!(result.errors[0].category, ErrorCategory::Syntax);
    }

    #[test]
    fn empty_bytecode_succeeds() {
        let result = execute_bytecode("", VmConfig::default());
        assert!(result.success);
        assert_eq!(result.state, VmState::HaltedSuccess);
    }
}
