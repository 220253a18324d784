//! Program representation models
//!
//! - `types`: element types with byte sizes
//! - `program`: module / function / block / instruction CFG IR
//! - `builder`: convenience builder for assembling functions in tests

pub mod builder;
pub mod program;
pub mod types;

pub use builder::FunctionBuilder;
pub use program::{
    Block, BlockId, Callee, FuncId, Function, Global, GlobalId, Inst, LocalDecl, LocalId, Module,
    Operand, Signature, Terminator,
};
pub use types::Type;
