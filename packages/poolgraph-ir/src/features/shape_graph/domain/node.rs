//! Heap node model
//!
//! A heap node abstracts one equivalence class of allocation sites within a
//! function's graph: one logical data structure for pooling purposes.

use serde::{Deserialize, Serialize};

use crate::shared::models::{FuncId, Type};

/// Identifier of a node within one function's graph.
///
/// Equal to the node's position in creation order; identity is stable once
/// graph merging completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Node attributes reported by the shape analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeFlags {
    /// At least one allocation site of the class allocates on the heap
    pub heap: bool,
    /// Reachable from module-level storage
    pub global: bool,
    /// The analysis could not see every use (e.g. external callers)
    pub incomplete: bool,
}

impl NodeFlags {
    pub fn with_heap(mut self) -> Self {
        self.heap = true;
        self
    }

    pub fn with_global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }

    /// OR the other flag set into this one
    pub fn merge(&mut self, other: NodeFlags) {
        self.heap |= other.heap;
        self.global |= other.global;
        self.incomplete |= other.incomplete;
    }
}

/// One heap-allocation equivalence class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapNode {
    pub id: NodeId,
    /// Element type; `Type::Opaque` when the analysis collapsed it
    pub ty: Type,
    pub flags: NodeFlags,
    /// Outgoing points-to edges, in field order
    pub edges: Vec<NodeId>,
    /// Resolved candidate functions when this node abstracts code addresses
    pub callees: Vec<FuncId>,
    /// Graph and id this node was first created in, when it arrived here by
    /// a cross-graph merge (`None` owner means the globals graph)
    pub origin: Option<(Option<FuncId>, NodeId)>,
}

impl HeapNode {
    pub fn new(id: NodeId, ty: Type, flags: NodeFlags) -> Self {
        Self { id, ty, flags, edges: Vec::new(), callees: Vec::new(), origin: None }
    }

    #[inline]
    pub fn is_heap(&self) -> bool {
        self.flags.heap
    }
}
