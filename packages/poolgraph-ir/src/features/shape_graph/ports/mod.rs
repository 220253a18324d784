//! Oracle port
//!
//! The points-to/shape analysis is an external collaborator. Anything that
//! can produce a [`ShapeAnalysis`] for a module can drive the transform;
//! tests use fixture oracles over hand-built graphs.

use super::domain::ShapeAnalysis;
use crate::shared::models::Module;

/// Producer of per-function node graphs
pub trait ShapeOracle {
    /// Analyze `module`, yielding one node graph per defined function plus
    /// the module-level globals graph.
    fn analyze(&self, module: &Module) -> ShapeAnalysis;
}
