//! Function builder
//!
//! Assembles CFG functions without hand-maintaining local and block
//! indices. Used heavily by tests and fixtures.

use super::program::{
    Block, BlockId, Callee, Function, Inst, LocalDecl, LocalId, Operand, Signature, Terminator,
};
use super::types::Type;

/// Incremental builder for a [`Function`]
pub struct FunctionBuilder {
    name: String,
    sig: Signature,
    locals: Vec<LocalDecl>,
    blocks: Vec<Block>,
    current: usize,
}

impl FunctionBuilder {
    /// Start a function; parameters become locals `0..params.len()` and an
    /// empty entry block is selected.
    pub fn new(name: impl Into<String>, sig: Signature) -> Self {
        let locals = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| LocalDecl { name: format!("arg{i}"), ty: ty.clone() })
            .collect();
        Self {
            name: name.into(),
            sig,
            locals,
            blocks: vec![Block { insts: Vec::new(), term: Terminator::Return(None) }],
            current: 0,
        }
    }

    /// Formal parameter `i` as a local
    #[inline]
    pub fn param(&self, i: u32) -> LocalId {
        LocalId(i)
    }

    /// Declare a fresh local value
    pub fn local(&mut self, ty: Type, name: impl Into<String>) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalDecl { name: name.into(), ty });
        id
    }

    /// Append an empty block (selection is unchanged)
    pub fn block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block { insts: Vec::new(), term: Terminator::Return(None) });
        id
    }

    /// Direct subsequent pushes at `bb`
    pub fn select(&mut self, bb: BlockId) {
        self.current = bb.0 as usize;
    }

    /// Append an instruction to the selected block
    pub fn push(&mut self, inst: Inst) {
        self.blocks[self.current].insts.push(inst);
    }

    /// Heap-allocate one element of `ty`, returning the pointer local
    pub fn heap_alloc(&mut self, ty: Type) -> LocalId {
        let dst = self.local(Type::ptr_to(ty.clone()), format!("t{}", self.locals.len()));
        self.push(Inst::HeapAlloc { dst, ty });
        dst
    }

    /// Append a call, returning the result local when `ret` is given
    pub fn call(&mut self, callee: Callee, args: Vec<Operand>, ret: Option<Type>) -> Option<LocalId> {
        let dst = ret.map(|ty| self.local(ty, format!("t{}", self.locals.len())));
        self.push(Inst::Call { dst, callee, args });
        dst
    }

    /// Set the selected block's terminator
    pub fn terminate(&mut self, term: Terminator) {
        self.blocks[self.current].term = term;
    }

    /// Terminate the selected block with a return
    pub fn ret(&mut self, value: Option<Operand>) {
        self.terminate(Terminator::Return(value));
    }

    pub fn finish(self) -> Function {
        Function {
            name: self.name,
            sig: self.sig,
            locals: self.locals,
            blocks: self.blocks,
            is_declaration: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_branching_function() {
        let mut b = FunctionBuilder::new("f", Signature::new(vec![Type::Int(32)], Type::Void));
        let bb1 = b.block();
        let bb2 = b.block();
        b.terminate(Terminator::Branch {
            cond: Operand::Local(b.param(0)),
            then_bb: bb1,
            else_bb: bb2,
        });
        b.select(bb1);
        let p = b.heap_alloc(Type::Int(64));
        b.push(Inst::HeapFree { ptr: Operand::Local(p) });
        b.ret(None);
        b.select(bb2);
        b.ret(None);

        let f = b.finish();
        assert_eq!(f.blocks.len(), 3);
        assert_eq!(f.return_blocks(), vec![bb1, bb2]);
        assert_eq!(f.locals.len(), 2); // arg0 plus the allocation result
    }
}
