//! Diagnostic stream and run summary
//!
//! Recoverable conditions degrade the transformation instead of aborting
//! it; each one is recorded here and echoed through `tracing` so both
//! humans and tests can see what was skipped or approximated.

use serde::Serialize;
use tracing::warn;

use crate::features::shape_graph::{CallSiteRef, NodeId};

/// One named warning about a function the transform could not handle fully
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// Indirect call with no resolved candidate callees; the site is left
    /// unrewritten and no pools are threaded through it
    UnresolvedIndirectTarget { function: String, site: CallSiteRef },
    /// Candidate set derived from an incomplete node; processed with
    /// whatever partial information exists
    IncompleteCalleeNode { function: String, site: CallSiteRef },
    /// Node element type unknown; pooled with unit size
    TypeCollapse { function: String, node: NodeId },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnresolvedIndirectTarget { function, site } => {
                write!(f, "indirect call at {site} in `{function}` has no resolved targets")
            }
            Diagnostic::IncompleteCalleeNode { function, site } => {
                write!(f, "indirect call at {site} in `{function}` targets an incomplete node")
            }
            Diagnostic::TypeCollapse { function, node } => {
                write!(
                    f,
                    "node {} in `{function}` has a collapsed type; not every data structure may be pool allocated",
                    node.0
                )
            }
        }
    }
}

/// Collects diagnostics and mirrors them to the log
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    items: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn emit(&mut self, diag: Diagnostic) {
        warn!(target: "poolgraph", "{diag}");
        self.items.push(diag);
    }

    #[inline]
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// A function whose transformation failed outright
#[derive(Debug, Clone, Serialize)]
pub struct FailedFunction {
    pub function: String,
    pub error: String,
}

/// Counters and warnings for one whole-program run
#[derive(Debug, Default, Serialize)]
pub struct TransformSummary {
    /// Pool-handle parameters injected across all clones
    pub args_added: usize,
    /// Functions replaced by clones
    pub functions_cloned: usize,
    /// Pool create operations inserted
    pub pools_inserted: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<FailedFunction>,
}

impl TransformSummary {
    #[inline]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Pretty JSON rendering for external tooling
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
