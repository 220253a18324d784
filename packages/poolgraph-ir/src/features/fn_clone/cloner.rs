//! Function cloning with injected pool-handle parameters
//!
//! A function is cloned iff it has live nodes, or it belongs to a class
//! whose watermark is nonzero: every class member is cloned in lock-step so
//! all clones behind one indirect call site share identical leading-
//! parameter arity, even members that use none of the reserved slots.

use tracing::debug;

use super::remap::{clone_blocks, ValueMap};
use crate::features::call_classes::FuncUnionFind;
use crate::features::pool_plan::{PlanningContext, PoolSource};
use crate::shared::models::{FuncId, Function, LocalDecl, LocalId, Module, Signature, Type};

/// Produces pool-aware replacement functions
pub struct FunctionCloner<'a> {
    classes: &'a mut FuncUnionFind,
}

impl<'a> FunctionCloner<'a> {
    pub fn new(classes: &'a mut FuncUnionFind) -> Self {
        Self { classes }
    }

    /// Number of leading handles `f`'s replacement must carry: the class
    /// watermark for members, the function's own live count otherwise.
    pub fn injected_count(&mut self, f: FuncId, ctx: &PlanningContext) -> u32 {
        match self.classes.find(f) {
            Some(rep) => ctx.reserved(rep),
            None => ctx.info(f).map(|i| i.live_count()).unwrap_or(0),
        }
    }

    /// Clone `f` if the plan requires it, returning the replacement id.
    /// Declarations are never cloned; a function needing zero injected
    /// parameters and not forced by class membership is skipped.
    pub fn clone_function(
        &mut self,
        module: &mut Module,
        f: FuncId,
        ctx: &mut PlanningContext,
    ) -> Option<FuncId> {
        if module.func(f).is_declaration {
            return None;
        }
        let injected = self.injected_count(f, ctx);
        if injected == 0 || ctx.info(f).is_none() {
            return None;
        }

        let src = module.func(f).clone();

        // handle parameters first, then the original signature
        let mut params = vec![Type::PoolHandle; injected as usize];
        params.extend(src.sig.params.iter().cloned());
        let sig = Signature { params, ret: src.sig.ret.clone(), variadic: src.sig.variadic };

        let mut locals = Vec::with_capacity(src.locals.len() + injected as usize);
        for slot in 0..injected {
            locals.push(LocalDecl { name: format!("pd{slot}"), ty: Type::PoolHandle });
        }
        locals.extend(src.locals.iter().cloned());

        // every old local shifts past the injected block
        let mut map = ValueMap::new();
        for old in 0..src.locals.len() as u32 {
            map.insert(LocalId(old), LocalId(old + injected));
        }
        let blocks = clone_blocks(&src.blocks, &map);

        let clone_id = module.add_function(Function {
            name: format!("{}.pool", src.name),
            sig,
            locals,
            blocks,
            is_declaration: false,
        });

        if let Some(info) = ctx.info_mut(f) {
            // bind live nodes to their formal slots; slots reserved for
            // other class members stay present, just unread here
            for (i, &node) in info.live.iter().enumerate() {
                info.descriptors.insert(node, PoolSource::Param(info.slot_first + i as u32));
            }
            info.clone = Some(clone_id);
            info.old_to_new = map.as_map().clone();
            info.new_to_old = map.invert();
        }

        debug!(
            target: "poolgraph",
            function = %src.name,
            injected,
            "cloned with pool parameters"
        );
        Some(clone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pool_plan::FunctionPoolInfo;
    use crate::features::shape_graph::NodeId;
    use crate::shared::models::{
        Callee, FunctionBuilder, Inst, Operand, Terminator,
    };

    fn plan(live: Vec<NodeId>, slot_first: u32) -> FunctionPoolInfo {
        FunctionPoolInfo { live, slot_first, ..Default::default() }
    }

    #[test]
    fn test_standalone_clone_gets_one_param_per_live_node() {
        let mut module = Module::default();
        let mut b = FunctionBuilder::new(
            "maker",
            Signature::new(vec![Type::Int(32)], Type::ptr_to(Type::Int(64))),
        );
        let p = b.heap_alloc(Type::Int(64));
        b.ret(Some(Operand::Local(p)));
        let f = module.add_function(b.finish());

        let mut ctx = PlanningContext::new();
        ctx.insert_info(f, plan(vec![NodeId(0)], 0));

        let mut classes = FuncUnionFind::new();
        let clone = FunctionCloner::new(&mut classes)
            .clone_function(&mut module, f, &mut ctx)
            .unwrap();

        let cf = module.func(clone);
        assert_eq!(cf.name, "maker.pool");
        assert_eq!(cf.sig.params.len(), 2);
        assert_eq!(cf.sig.params[0], Type::PoolHandle);
        assert!(!cf.sig.variadic);
        // body locals shifted past the handle
        assert_eq!(
            cf.blocks[0].insts[0],
            Inst::HeapAlloc { dst: LocalId(2), ty: Type::Int(64) }
        );
        assert_eq!(cf.blocks[0].term, Terminator::Return(Some(Operand::Local(LocalId(2)))));

        let info = ctx.info(f).unwrap();
        assert_eq!(info.clone, Some(clone));
        assert_eq!(info.new_to_old.get(&LocalId(2)), Some(&LocalId(1)));
    }

    #[test]
    fn test_class_member_with_no_live_nodes_clones_in_lockstep() {
        let mut module = Module::default();
        let mut b = FunctionBuilder::new("idle", Signature::new(Vec::new(), Type::Void));
        b.ret(None);
        let f = module.add_function(b.finish());
        let g = module.add_function(Function::declaration(
            "other",
            Signature::new(Vec::new(), Type::Void),
        ));

        let mut classes = FuncUnionFind::new();
        classes.union(f, g);
        let rep = classes.find(f).unwrap();

        let mut ctx = PlanningContext::new();
        ctx.insert_info(f, plan(Vec::new(), 0));
        ctx.reserve(rep, 2); // siblings reserved two slots

        let clone = FunctionCloner::new(&mut classes)
            .clone_function(&mut module, f, &mut ctx)
            .unwrap();
        assert_eq!(module.func(clone).sig.params.len(), 2);
    }

    #[test]
    fn test_zero_need_standalone_is_skipped() {
        let mut module = Module::default();
        let mut b = FunctionBuilder::new("plain", Signature::new(Vec::new(), Type::Void));
        b.ret(None);
        let f = module.add_function(b.finish());

        let mut ctx = PlanningContext::new();
        ctx.insert_info(f, plan(Vec::new(), 0));

        let mut classes = FuncUnionFind::new();
        assert!(FunctionCloner::new(&mut classes).clone_function(&mut module, f, &mut ctx).is_none());
    }

    #[test]
    fn test_declaration_is_never_cloned() {
        let mut module = Module::default();
        let f = module.add_function(Function::declaration(
            "ext",
            Signature::new(Vec::new(), Type::Void),
        ));
        let g = module.add_function(Function::declaration(
            "ext2",
            Signature::new(Vec::new(), Type::Void),
        ));
        let mut classes = FuncUnionFind::new();
        classes.union(f, g);
        let rep = classes.find(f).unwrap();
        let mut ctx = PlanningContext::new();
        ctx.reserve(rep, 3);
        assert!(FunctionCloner::new(&mut classes).clone_function(&mut module, f, &mut ctx).is_none());
    }

    #[test]
    fn test_variadic_is_preserved_and_calls_remap() {
        let mut module = Module::default();
        let ext = module.add_function(Function::declaration(
            "sink",
            Signature::new(vec![Type::Int(32)], Type::Void),
        ));
        let mut b = FunctionBuilder::new(
            "vlog",
            Signature::variadic(vec![Type::Int(32)], Type::Void),
        );
        let p = b.heap_alloc(Type::Int(8));
        b.call(Callee::Direct(ext), vec![Operand::Local(p)], None);
        b.ret(None);
        let f = module.add_function(b.finish());

        let mut ctx = PlanningContext::new();
        ctx.insert_info(f, plan(vec![NodeId(0)], 0));
        let mut classes = FuncUnionFind::new();
        let clone = FunctionCloner::new(&mut classes)
            .clone_function(&mut module, f, &mut ctx)
            .unwrap();

        let cf = module.func(clone);
        assert!(cf.sig.variadic);
        match &cf.blocks[0].insts[1] {
            Inst::Call { callee: Callee::Direct(target), args, .. } => {
                assert_eq!(*target, ext); // other functions default to themselves
                assert_eq!(args[0], Operand::Local(LocalId(2)));
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }
}
