//! Domain models for the shape-analysis surface
//!
//! - `node`: heap nodes and their flags
//! - `call_site`: call descriptors with argument/return node bindings
//! - `graph`: per-function node graphs and the merge operations

pub mod call_site;
pub mod graph;
pub mod node;

pub use call_site::{CallDesc, CallSiteRef, CallTarget};
pub use graph::{GraphBuilder, NodeGraph, ScalarRef, ShapeAnalysis};
pub use node::{HeapNode, NodeFlags, NodeId};
