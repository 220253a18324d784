//! Planning context
//!
//! All shared mutable planning state lives here and is threaded through
//! calls explicitly: per-class slot watermarks and the per-function pool
//! plans. Holding the watermarks in one owned structure is what makes the
//! two-phase barrier (plan everything, then clone everything) visible in
//! the driver and testable on its own.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::features::shape_graph::NodeId;
use crate::shared::models::{FuncId, LocalId, Operand};

/// Per-function progress through the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Stage {
    #[default]
    Unanalyzed,
    GraphMerged,
    /// Needs externally supplied handles; will be cloned
    PlannedLive,
    /// No handles needed; body may still gain local pools
    PlannedDead,
    Cloned,
    Rewritten,
}

/// Where a function finds the pool for one of its nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSource {
    /// Received as the injected formal at this slot
    Param(u32),
    /// Owned locally, created at entry
    Local(LocalId),
}

/// Pool plan for one original function
#[derive(Debug, Default)]
pub struct FunctionPoolInfo {
    /// Nodes needing externally supplied handles, in node creation order
    pub live: Vec<NodeId>,
    /// First slot of this function's range within its class
    pub slot_first: u32,
    /// Node to pool-source binding, filled by cloning and pool creation
    pub descriptors: FxHashMap<NodeId, PoolSource>,
    /// Argv-derived nodes; never pooled
    pub excluded: FxHashSet<NodeId>,
    /// Replacement function, when one was made
    pub clone: Option<FuncId>,
    /// Old-to-new value correspondence produced by cloning
    pub old_to_new: FxHashMap<LocalId, LocalId>,
    /// Inverse correspondence for downstream tooling
    pub new_to_old: FxHashMap<LocalId, LocalId>,
}

impl FunctionPoolInfo {
    #[inline]
    pub fn live_count(&self) -> u32 {
        self.live.len() as u32
    }

    #[inline]
    pub fn is_live(&self, node: NodeId) -> bool {
        self.live.contains(&node)
    }

    /// Operand for the pool handle owning `node`, if the node is pooled
    pub fn handle(&self, node: NodeId) -> Option<Operand> {
        match self.descriptors.get(&node)? {
            PoolSource::Param(slot) => Some(Operand::Local(LocalId(*slot))),
            PoolSource::Local(local) => Some(Operand::Local(*local)),
        }
    }

    /// Translate a cloned-body local back to its original
    #[inline]
    pub fn to_old(&self, local: LocalId) -> LocalId {
        self.new_to_old.get(&local).copied().unwrap_or(local)
    }
}

/// Shared state for the planning and cloning phases
#[derive(Debug, Default)]
pub struct PlanningContext {
    /// Slots reserved so far per class representative: the next member's
    /// range starts here, and the final value is the class arity
    reserved: FxHashMap<FuncId, u32>,
    infos: FxHashMap<FuncId, FunctionPoolInfo>,
    stages: FxHashMap<FuncId, Stage>,
}

impl PlanningContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots reserved so far for the class led by `rep`
    #[inline]
    pub fn reserved(&self, rep: FuncId) -> u32 {
        self.reserved.get(&rep).copied().unwrap_or(0)
    }

    /// Reserve `count` more slots for the class led by `rep`, returning the
    /// first slot of the new range
    pub fn reserve(&mut self, rep: FuncId, count: u32) -> u32 {
        let entry = self.reserved.entry(rep).or_insert(0);
        let first = *entry;
        *entry += count;
        first
    }

    pub fn info(&self, f: FuncId) -> Option<&FunctionPoolInfo> {
        self.infos.get(&f)
    }

    pub fn info_mut(&mut self, f: FuncId) -> Option<&mut FunctionPoolInfo> {
        self.infos.get_mut(&f)
    }

    pub fn insert_info(&mut self, f: FuncId, info: FunctionPoolInfo) {
        self.infos.insert(f, info);
    }

    #[inline]
    pub fn stage(&self, f: FuncId) -> Stage {
        self.stages.get(&f).copied().unwrap_or_default()
    }

    pub fn set_stage(&mut self, f: FuncId, stage: Stage) {
        self.stages.insert(f, stage);
    }
}
