//! In-memory program representation
//!
//! A minimal CFG IR: a module holds functions and globals, functions hold
//! basic blocks, blocks hold instructions plus exactly one terminator.
//! Every value-producing instruction defines a `LocalId`; locals
//! `0..sig.params.len()` are the formal parameters. `blocks[0]` is the
//! entry block.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Type;

/// Index of a function within its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Index of a global within its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

/// Index of a basic block within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Index of a local value within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Module-level variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub ty: Type,
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
    pub variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret, variadic: false }
    }

    pub fn variadic(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret, variadic: true }
    }
}

/// Declared local value (parameter or instruction result)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: Type,
}

/// Instruction or terminator operand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Local(LocalId),
    Global(GlobalId),
    /// A function address used as a value
    Func(FuncId),
    Const(i64),
    /// Placeholder handle for a reserved but unbound pool slot
    NullPool,
}

/// Call destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callee {
    Direct(FuncId),
    Indirect(Operand),
}

/// Instructions
///
/// `HeapAlloc`/`HeapFree` are the pre-transform allocation primitives; the
/// `Pool*` variants form the abstract pool interface the transform emits
/// against. No allocator implementation is chosen here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inst {
    HeapAlloc { dst: LocalId, ty: Type },
    HeapFree { ptr: Operand },
    PoolCreate { dst: LocalId, elem_size: u32, freeable: bool },
    PoolDestroy { pool: Operand },
    PoolAlloc { dst: LocalId, pool: Operand, ty: Type },
    PoolFree { pool: Operand, ptr: Operand },
    Call { dst: Option<LocalId>, callee: Callee, args: Vec<Operand> },
    Load { dst: LocalId, ptr: Operand },
    Store { value: Operand, ptr: Operand },
    Cast { dst: LocalId, value: Operand },
    Gep { dst: LocalId, base: Operand, index: u32 },
}

impl Inst {
    /// Every operand position that may carry a function address as a value.
    /// The direct-call destination is deliberately excluded: retargeting it
    /// is the call rewriter's job, not a value substitution.
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Inst::HeapAlloc { .. } | Inst::PoolCreate { .. } => Vec::new(),
            Inst::HeapFree { ptr } => vec![ptr],
            Inst::PoolDestroy { pool } => vec![pool],
            Inst::PoolAlloc { pool, .. } => vec![pool],
            Inst::PoolFree { pool, ptr } => vec![pool, ptr],
            Inst::Call { callee, args, .. } => {
                let mut ops: Vec<&mut Operand> = args.iter_mut().collect();
                if let Callee::Indirect(op) = callee {
                    ops.push(op);
                }
                ops
            }
            Inst::Load { ptr, .. } => vec![ptr],
            Inst::Store { value, ptr } => vec![value, ptr],
            Inst::Cast { value, .. } => vec![value],
            Inst::Gep { base, .. } => vec![base],
        }
    }
}

/// Block terminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Return(Option<Operand>),
    Jump(BlockId),
    Branch { cond: Operand, then_bb: BlockId, else_bb: BlockId },
}

impl Terminator {
    #[inline]
    pub fn is_return(&self) -> bool {
        matches!(self, Terminator::Return(_))
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Terminator::Return(Some(op)) => vec![op],
            Terminator::Return(None) | Terminator::Jump(_) => Vec::new(),
            Terminator::Branch { cond, .. } => vec![cond],
        }
    }

    /// Successor blocks, in branch order
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return(_) => Vec::new(),
            Terminator::Jump(bb) => vec![*bb],
            Terminator::Branch { then_bb, else_bb, .. } => vec![*then_bb, *else_bb],
        }
    }
}

/// Basic block: straight-line instructions plus one terminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub insts: Vec<Inst>,
    pub term: Terminator,
}

/// Function definition or declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub sig: Signature,
    /// Parameters first, then instruction results
    pub locals: Vec<LocalDecl>,
    pub blocks: Vec<Block>,
    pub is_declaration: bool,
}

impl Function {
    /// External declaration with no body
    pub fn declaration(name: impl Into<String>, sig: Signature) -> Self {
        let name = name.into();
        let locals = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| LocalDecl { name: format!("arg{i}"), ty: ty.clone() })
            .collect();
        Self { name, sig, locals, blocks: Vec::new(), is_declaration: true }
    }

    #[inline]
    pub fn param_count(&self) -> usize {
        self.sig.params.len()
    }

    /// Append a fresh local value
    pub fn add_local(&mut self, ty: Type, name: impl Into<String>) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalDecl { name: name.into(), ty });
        id
    }

    /// Blocks ending in a return, in block order
    pub fn return_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.term.is_return())
            .map(|(i, _)| BlockId(i as u32))
            .collect()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }
}

/// Whole program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn add_function(&mut self, f: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(f);
        id
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: Type) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(Global { name: name.into(), ty });
        id
    }

    /// Ids of functions with a body, in module order
    pub fn defined_ids(&self) -> Vec<FuncId> {
        self.functions
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_declaration)
            .map(|(i, _)| FuncId(i as u32))
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_blocks() {
        let f = Function {
            name: "f".into(),
            sig: Signature::new(Vec::new(), Type::Void),
            locals: Vec::new(),
            blocks: vec![
                Block {
                    insts: Vec::new(),
                    term: Terminator::Branch {
                        cond: Operand::Const(1),
                        then_bb: BlockId(1),
                        else_bb: BlockId(2),
                    },
                },
                Block { insts: Vec::new(), term: Terminator::Return(None) },
                Block { insts: Vec::new(), term: Terminator::Return(None) },
            ],
            is_declaration: false,
        };
        assert_eq!(f.return_blocks(), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn test_defined_ids_skip_declarations() {
        let mut m = Module::default();
        m.add_function(Function::declaration("malloc", Signature::new(vec![Type::Int(64)], Type::ptr_to(Type::Void))));
        let f = m.add_function(Function {
            name: "f".into(),
            sig: Signature::new(Vec::new(), Type::Void),
            locals: Vec::new(),
            blocks: vec![Block { insts: Vec::new(), term: Terminator::Return(None) }],
            is_declaration: false,
        });
        assert_eq!(m.defined_ids(), vec![f]);
        assert_eq!(m.find("f"), Some(f));
    }

    #[test]
    fn test_call_operands_include_indirect_callee() {
        let mut call = Inst::Call {
            dst: None,
            callee: Callee::Indirect(Operand::Local(LocalId(3))),
            args: vec![Operand::Const(7)],
        };
        assert_eq!(call.operands_mut().len(), 2);
    }
}
