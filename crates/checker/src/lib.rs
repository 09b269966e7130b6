//! Aegis checker: static type and constraint checking of syntax trees.
//!
//! The checker infers a type for every [`SyntaxNode`], attaches the
//! constraints relevant to the node kind, and evaluates them against a
//! replay of the program. It collects ALL findings rather than stopping
//! at the first.
//!
//! # Passes
//!
//! 0. **Fold**: entity modifiers folded into final entity attributes
//! 1. **Infer**: name resolution, literal validation, constraint attachment
//! 2. **Replay**: in-order constraint evaluation (`Pre`, effect, `Post`),
//!    then `Final` constraints against the end state
//!
//! Failures of required constraints are errors; the rest are warnings.

pub mod constraint;
pub mod context;
pub mod error;
pub mod fold;
pub mod infer;
pub mod replay;
pub mod types;

pub use constraint::{CheckPhase, Constraint, ConstraintKind, UsageScope, Violation};
pub use context::{ConstraintContext, EntityView};
pub use error::CheckError;
pub use types::{InferredType, TypeKind};

use aegis_common::{Diagnostics, SyntaxNode, EXPLAINABILITY_THRESHOLD};
use infer::{Inference, SymbolTables};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of interactions a handle tolerates before the checker
/// warns that it may have decohered.
pub const DEFAULT_MAX_COHERENT_OPERATIONS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerOptions {
    pub explainability_threshold: f64,
    pub max_coherent_operations: usize,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            explainability_threshold: EXPLAINABILITY_THRESHOLD,
            max_coherent_operations: DEFAULT_MAX_COHERENT_OPERATIONS,
        }
    }
}

/// Result of one checking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    /// One type per node, in node order.
    pub types: Vec<InferredType>,
    pub diagnostics: Diagnostics,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

#[derive(Debug, Default)]
pub struct TypeChecker {
    options: CheckerOptions,
    tables: SymbolTables,
}

impl TypeChecker {
    pub fn new(options: CheckerOptions) -> Self {
        Self {
            options,
            tables: SymbolTables::default(),
        }
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    pub fn reset(&mut self) {
        self.tables.clear();
    }

    /// Check a program. Tables from any previous pass are discarded first.
    pub fn check(&mut self, nodes: &[SyntaxNode]) -> CheckReport {
        self.reset();

        let entities = fold::fold_entities(nodes);

        let mut inference = Inference::new(&mut self.tables, &entities, &self.options);
        let types: Vec<InferredType> = nodes.iter().map(|n| inference.infer(n)).collect();
        let mut diagnostics = Diagnostics::new();
        for d in inference.diagnostics {
            diagnostics.push(d);
        }

        for d in replay::replay(
            nodes,
            &types,
            &entities,
            self.options.max_coherent_operations,
        ) {
            diagnostics.push(d);
        }

        debug!(
            nodes = nodes.len(),
            errors = diagnostics.errors.len(),
            warnings = diagnostics.warnings.len(),
            "type check finished"
        );

        CheckReport { types, diagnostics }
    }
}

/// Check `nodes` with default options.
pub fn check(nodes: &[SyntaxNode]) -> CheckReport {
    TypeChecker::default().check(nodes)
}
