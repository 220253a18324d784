//! Call descriptors reported by the shape analysis

use serde::{Deserialize, Serialize};

use super::node::NodeId;
use crate::shared::models::{BlockId, FuncId};

/// Position of a call instruction inside its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSiteRef {
    pub block: BlockId,
    /// Instruction index within the block
    pub inst: usize,
}

impl CallSiteRef {
    pub fn new(block: BlockId, inst: usize) -> Self {
        Self { block, inst }
    }
}

impl std::fmt::Display for CallSiteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.block, self.inst)
    }
}

/// Resolved or unresolved call destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallTarget {
    Direct(FuncId),
    /// Call through a value abstracted by `node`; candidates live on the node
    Indirect { node: NodeId },
}

/// One call in a function's graph, with the caller-side nodes bound to its
/// pointer arguments and result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDesc {
    pub site: CallSiteRef,
    pub target: CallTarget,
    /// Caller node for each callee formal, `None` for non-pointer arguments
    pub arg_nodes: Vec<Option<NodeId>>,
    /// Caller node behind the call's result
    pub ret_node: Option<NodeId>,
}

impl CallDesc {
    pub fn direct(site: CallSiteRef, callee: FuncId) -> Self {
        Self { site, target: CallTarget::Direct(callee), arg_nodes: Vec::new(), ret_node: None }
    }

    pub fn indirect(site: CallSiteRef, node: NodeId) -> Self {
        Self { site, target: CallTarget::Indirect { node }, arg_nodes: Vec::new(), ret_node: None }
    }

    pub fn with_arg_nodes(mut self, arg_nodes: Vec<Option<NodeId>>) -> Self {
        self.arg_nodes = arg_nodes;
        self
    }

    pub fn with_ret_node(mut self, ret: NodeId) -> Self {
        self.ret_node = Some(ret);
        self
    }

    #[inline]
    pub fn is_indirect(&self) -> bool {
        matches!(self.target, CallTarget::Indirect { .. })
    }
}
