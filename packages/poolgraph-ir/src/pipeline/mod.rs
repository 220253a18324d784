//! Pipeline orchestration
//!
//! Drives the features in dependency order over a whole module and
//! collects the run summary.

pub mod diagnostics;
pub mod transform;

pub use diagnostics::{Diagnostic, DiagnosticSink, FailedFunction, TransformSummary};
pub use transform::PoolTransform;
