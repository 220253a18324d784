//! Allocation redirection
//!
//! Heap allocate/free operations whose target node is pool-managed are
//! replaced in place by the pool-scoped primitives of the descriptor that
//! owns the node. Allocations for non-pool-managed storage (argv-derived,
//! unmapped) are untouched.

use crate::features::pool_plan::FunctionPoolInfo;
use crate::features::shape_graph::{NodeGraph, ScalarRef};
use crate::shared::models::{FuncId, Inst, Module, Operand};

/// Redirects heap allocate/free sites to their owning pools
pub struct AllocRewriter;

impl AllocRewriter {
    /// Rewrite `body`, consulting the original function's scalar map via
    /// the clone's new-to-old value correspondence.
    pub fn rewrite(module: &mut Module, body: FuncId, graph: &NodeGraph, info: &FunctionPoolInfo) {
        let func = module.func_mut(body);
        for block in &mut func.blocks {
            for inst in &mut block.insts {
                match inst {
                    Inst::HeapAlloc { dst, ty } => {
                        let old = info.to_old(*dst);
                        let Some(node) = graph.scalar_node(ScalarRef::Local(old)) else {
                            continue;
                        };
                        let Some(pool) = info.handle(node) else { continue };
                        let (dst, ty) = (*dst, ty.clone());
                        *inst = Inst::PoolAlloc { dst, pool, ty };
                    }
                    Inst::HeapFree { ptr } => {
                        let Operand::Local(l) = ptr else { continue };
                        let old = info.to_old(*l);
                        let Some(node) = graph.scalar_node(ScalarRef::Local(old)) else {
                            continue;
                        };
                        let Some(pool) = info.handle(node) else { continue };
                        let ptr = ptr.clone();
                        *inst = Inst::PoolFree { pool, ptr };
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pool_plan::PoolSource;
    use crate::features::shape_graph::{GraphBuilder, NodeFlags};
    use crate::shared::models::{
        FunctionBuilder, LocalId, Signature, Type,
    };

    #[test]
    fn test_alloc_and_free_redirect_to_pool() {
        let mut module = Module::default();
        let mut b = FunctionBuilder::new("f", Signature::new(Vec::new(), Type::Void));
        let p = b.heap_alloc(Type::Int(64));
        b.push(Inst::HeapFree { ptr: Operand::Local(p) });
        b.ret(None);
        let f = module.add_function(b.finish());

        let mut gb = GraphBuilder::new();
        let n = gb.node(Type::Int(64), NodeFlags::default().with_heap());
        gb.scalar(ScalarRef::Local(p), n);
        let graph = gb.build();

        let mut info = FunctionPoolInfo::default();
        let pool = LocalId(7);
        info.descriptors.insert(n, PoolSource::Local(pool));

        AllocRewriter::rewrite(&mut module, f, &graph, &info);
        let insts = &module.func(f).blocks[0].insts;
        assert_eq!(
            insts[0],
            Inst::PoolAlloc { dst: p, pool: Operand::Local(pool), ty: Type::Int(64) }
        );
        assert_eq!(
            insts[1],
            Inst::PoolFree { pool: Operand::Local(pool), ptr: Operand::Local(p) }
        );
    }

    #[test]
    fn test_unmanaged_alloc_is_untouched() {
        let mut module = Module::default();
        let mut b = FunctionBuilder::new("f", Signature::new(Vec::new(), Type::Void));
        let p = b.heap_alloc(Type::Int(64));
        b.ret(None);
        let f = module.add_function(b.finish());

        let mut gb = GraphBuilder::new();
        let n = gb.node(Type::Int(64), NodeFlags::default().with_heap());
        gb.scalar(ScalarRef::Local(p), n);
        let graph = gb.build();

        // no descriptor for the node: stays a plain heap allocation
        let info = FunctionPoolInfo::default();
        AllocRewriter::rewrite(&mut module, f, &graph, &info);
        assert!(matches!(module.func(f).blocks[0].insts[0], Inst::HeapAlloc { .. }));
    }
}
