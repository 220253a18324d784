//! Copy a control-flow graph under a partial value remap
//!
//! References absent from the map default to themselves: globals, function
//! addresses and constants survive a clone untouched while locals move to
//! their mapped slots. This is generic over anything CFG-shaped; the
//! cloner is just one caller.

use rustc_hash::FxHashMap;

use crate::shared::models::{Block, Callee, Inst, LocalId, Operand, Terminator};

/// Partial local-to-local correspondence with identity as the default
#[derive(Debug, Default, Clone)]
pub struct ValueMap {
    map: FxHashMap<LocalId, LocalId>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: LocalId, new: LocalId) {
        self.map.insert(old, new);
    }

    /// Mapped local, or `old` itself when unmapped
    #[inline]
    pub fn resolve(&self, old: LocalId) -> LocalId {
        self.map.get(&old).copied().unwrap_or(old)
    }

    pub fn as_map(&self) -> &FxHashMap<LocalId, LocalId> {
        &self.map
    }

    /// New-to-old correspondence for downstream tooling
    pub fn invert(&self) -> FxHashMap<LocalId, LocalId> {
        self.map.iter().map(|(&old, &new)| (new, old)).collect()
    }

    fn operand(&self, op: &Operand) -> Operand {
        match op {
            Operand::Local(l) => Operand::Local(self.resolve(*l)),
            other => other.clone(),
        }
    }

    fn inst(&self, inst: &Inst) -> Inst {
        match inst {
            Inst::HeapAlloc { dst, ty } => Inst::HeapAlloc { dst: self.resolve(*dst), ty: ty.clone() },
            Inst::HeapFree { ptr } => Inst::HeapFree { ptr: self.operand(ptr) },
            Inst::PoolCreate { dst, elem_size, freeable } => Inst::PoolCreate {
                dst: self.resolve(*dst),
                elem_size: *elem_size,
                freeable: *freeable,
            },
            Inst::PoolDestroy { pool } => Inst::PoolDestroy { pool: self.operand(pool) },
            Inst::PoolAlloc { dst, pool, ty } => Inst::PoolAlloc {
                dst: self.resolve(*dst),
                pool: self.operand(pool),
                ty: ty.clone(),
            },
            Inst::PoolFree { pool, ptr } => Inst::PoolFree {
                pool: self.operand(pool),
                ptr: self.operand(ptr),
            },
            Inst::Call { dst, callee, args } => Inst::Call {
                dst: dst.map(|d| self.resolve(d)),
                callee: match callee {
                    Callee::Direct(f) => Callee::Direct(*f),
                    Callee::Indirect(op) => Callee::Indirect(self.operand(op)),
                },
                args: args.iter().map(|a| self.operand(a)).collect(),
            },
            Inst::Load { dst, ptr } => Inst::Load { dst: self.resolve(*dst), ptr: self.operand(ptr) },
            Inst::Store { value, ptr } => Inst::Store {
                value: self.operand(value),
                ptr: self.operand(ptr),
            },
            Inst::Cast { dst, value } => Inst::Cast {
                dst: self.resolve(*dst),
                value: self.operand(value),
            },
            Inst::Gep { dst, base, index } => Inst::Gep {
                dst: self.resolve(*dst),
                base: self.operand(base),
                index: *index,
            },
        }
    }

    fn terminator(&self, term: &Terminator) -> Terminator {
        match term {
            Terminator::Return(value) => Terminator::Return(value.as_ref().map(|v| self.operand(v))),
            Terminator::Jump(bb) => Terminator::Jump(*bb),
            Terminator::Branch { cond, then_bb, else_bb } => Terminator::Branch {
                cond: self.operand(cond),
                then_bb: *then_bb,
                else_bb: *else_bb,
            },
        }
    }
}

/// Clone a body, rewriting every local reference through `map`. Block
/// structure and instruction positions are preserved exactly.
pub fn clone_blocks(blocks: &[Block], map: &ValueMap) -> Vec<Block> {
    blocks
        .iter()
        .map(|b| Block {
            insts: b.insts.iter().map(|i| map.inst(i)).collect(),
            term: map.terminator(&b.term),
        })
        .collect()
}
