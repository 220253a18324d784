//! Shape-analysis surface
//!
//! The transform does not compute points-to information itself; it consumes
//! per-function node graphs produced by an external shape analysis. This
//! feature holds the node-graph domain model, the merge operations the
//! inliner and rewriter share, and the oracle port.

pub mod domain;
pub mod ports;

pub use domain::call_site::{CallDesc, CallSiteRef, CallTarget};
pub use domain::graph::{GraphBuilder, NodeGraph, ScalarRef};
pub use domain::node::{HeapNode, NodeFlags, NodeId};
pub use domain::ShapeAnalysis;
pub use ports::ShapeOracle;
