//! Call-site retargeting
//!
//! Direct calls to cloned callees are repointed at the clone with the
//! caller's handles for the callee's live nodes prepended. Handles the
//! caller itself only received are forwarded, owned descriptors are passed
//! directly. Indirect calls prepend the full class-width handle vector,
//! since the concrete callee is unknown until runtime and every class
//! member expects identical arity; slots the caller cannot bind carry the
//! null pool handle.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::{PoolError, Result};
use crate::features::call_classes::{CallSiteTargets, FuncUnionFind};
use crate::features::pool_plan::PlanningContext;
use crate::features::shape_graph::{CallDesc, CallSiteRef, CallTarget, ShapeAnalysis};
use crate::shared::models::{Callee, FuncId, Function, Inst, Module, Operand};

/// Rewrites every call in a transformed body
pub struct CallRewriter<'a> {
    classes: &'a mut FuncUnionFind,
    targets: &'a CallSiteTargets,
}

impl<'a> CallRewriter<'a> {
    pub fn new(classes: &'a mut FuncUnionFind, targets: &'a CallSiteTargets) -> Self {
        Self { classes, targets }
    }

    /// Rewrite the calls of original function `f`, whose surviving body is
    /// `body` (the clone when one exists, `f` itself otherwise).
    pub fn rewrite(
        &mut self,
        module: &mut Module,
        f: FuncId,
        body: FuncId,
        analysis: &ShapeAnalysis,
        ctx: &PlanningContext,
    ) -> Result<()> {
        let Some(graph) = analysis.graph(f) else { return Ok(()) };
        let Some(caller_info) = ctx.info(f) else { return Ok(()) };
        let fname = module.func(f).name.clone();

        for call in &graph.calls {
            match call.target {
                CallTarget::Direct(callee) => {
                    let Some(callee_info) = ctx.info(callee) else { continue };
                    let Some(clone) = callee_info.clone else { continue };
                    let Some(callee_graph) = analysis.graph(callee) else { continue };

                    let width = match self.classes.find(callee) {
                        Some(rep) => ctx.reserved(rep),
                        None => callee_info.live_count(),
                    };
                    let mut handles = vec![Operand::NullPool; width as usize];
                    let node_map =
                        graph.callee_caller_map(call, module.func(callee), callee_graph);
                    for (i, &callee_node) in callee_info.live.iter().enumerate() {
                        let slot = (callee_info.slot_first + i as u32) as usize;
                        if let Some(op) = node_map
                            .get(&callee_node)
                            .and_then(|caller_node| caller_info.handle(*caller_node))
                        {
                            handles[slot] = op;
                        }
                    }
                    patch_direct(module.func_mut(body), &fname, call, clone, handles)?;
                }
                CallTarget::Indirect { .. } => {
                    let candidates = self.targets.targets(&(f, call.site));
                    if candidates.is_empty() {
                        // unresolved: diagnosed during classification, the
                        // site stays unrewritten with no pools threaded
                        continue;
                    }
                    let Some(rep) = self.classes.find(candidates[0]) else { continue };
                    let width = ctx.reserved(rep);
                    if width == 0 {
                        continue;
                    }
                    let mut handles = vec![Operand::NullPool; width as usize];
                    for &candidate in candidates {
                        let Some(ci) = ctx.info(candidate) else { continue };
                        let Some(cand_graph) = analysis.graph(candidate) else { continue };
                        let node_map =
                            graph.callee_caller_map(call, module.func(candidate), cand_graph);
                        for (i, &callee_node) in ci.live.iter().enumerate() {
                            let slot = (ci.slot_first + i as u32) as usize;
                            if !matches!(handles[slot], Operand::NullPool) {
                                continue;
                            }
                            if let Some(op) = node_map
                                .get(&callee_node)
                                .and_then(|caller_node| caller_info.handle(*caller_node))
                            {
                                handles[slot] = op;
                            }
                        }
                    }
                    patch_indirect(module.func_mut(body), &fname, call, handles)?;
                }
            }
        }
        debug!(target: "poolgraph", function = %fname, "call sites rewritten");
        Ok(())
    }

    /// Map from class members to their clones; indirect dispatch must land
    /// on the uniform-arity clones, so function addresses used as values
    /// are retargeted with this map.
    pub fn class_clone_map(&mut self, ctx: &PlanningContext, module: &Module) -> FxHashMap<FuncId, FuncId> {
        let mut out = FxHashMap::default();
        for (i, _) in module.functions.iter().enumerate() {
            let f = FuncId(i as u32);
            if self.classes.find(f).is_none() {
                continue;
            }
            if let Some(clone) = ctx.info(f).and_then(|info| info.clone) {
                out.insert(f, clone);
            }
        }
        out
    }

    /// Replace function-address operands of cloned class members with their
    /// clones throughout `body`.
    pub fn retarget_fn_values(
        module: &mut Module,
        body: FuncId,
        clone_map: &FxHashMap<FuncId, FuncId>,
    ) {
        if clone_map.is_empty() {
            return;
        }
        let func = module.func_mut(body);
        for block in &mut func.blocks {
            for inst in &mut block.insts {
                for op in inst.operands_mut() {
                    if let Operand::Func(g) = op {
                        if let Some(&clone) = clone_map.get(g) {
                            *op = Operand::Func(clone);
                        }
                    }
                }
            }
            for op in block.term.operands_mut() {
                if let Operand::Func(g) = op {
                    if let Some(&clone) = clone_map.get(g) {
                        *op = Operand::Func(clone);
                    }
                }
            }
        }
    }
}

/// Find the call instruction at `site` or report the body as inconsistent
fn call_inst_at<'b>(
    func: &'b mut Function,
    fname: &str,
    site: CallSiteRef,
) -> Result<&'b mut Inst> {
    func.blocks
        .get_mut(site.block.0 as usize)
        .and_then(|b| b.insts.get_mut(site.inst))
        .ok_or_else(|| PoolError::stale_site(fname, format!("no instruction at {site}")))
}

fn patch_direct(
    func: &mut Function,
    fname: &str,
    call: &CallDesc,
    clone: FuncId,
    handles: Vec<Operand>,
) -> Result<()> {
    match call_inst_at(func, fname, call.site)? {
        Inst::Call { callee: callee @ Callee::Direct(_), args, .. } => {
            *callee = Callee::Direct(clone);
            args.splice(0..0, handles);
            Ok(())
        }
        Inst::Call { .. } => Err(PoolError::inconsistency(
            fname,
            format!("direct call descriptor at {} addresses an indirect call", call.site),
        )),
        _ => Err(PoolError::stale_site(
            fname,
            format!("instruction at {} is not a call", call.site),
        )),
    }
}

fn patch_indirect(
    func: &mut Function,
    fname: &str,
    call: &CallDesc,
    handles: Vec<Operand>,
) -> Result<()> {
    match call_inst_at(func, fname, call.site)? {
        Inst::Call { callee: Callee::Indirect(_), args, .. } => {
            args.splice(0..0, handles);
            Ok(())
        }
        Inst::Call { .. } => Err(PoolError::inconsistency(
            fname,
            format!("indirect call descriptor at {} addresses a direct call", call.site),
        )),
        _ => Err(PoolError::stale_site(
            fname,
            format!("instruction at {} is not a call", call.site),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BlockId, LocalId, Signature, Type};

    #[test]
    fn test_patch_mismatched_kind_is_inconsistent() {
        let mut b = crate::shared::models::FunctionBuilder::new(
            "f",
            Signature::new(Vec::new(), Type::Void),
        );
        b.call(Callee::Indirect(Operand::Local(LocalId(0))), Vec::new(), None);
        b.ret(None);
        let mut func = b.finish();

        let call = CallDesc::direct(CallSiteRef::new(BlockId(0), 0), FuncId(3));
        let err = patch_direct(&mut func, "f", &call, FuncId(9), Vec::new()).unwrap_err();
        assert!(matches!(err, PoolError::StructuralInconsistency { .. }));
    }

    #[test]
    fn test_patch_out_of_range_site_is_stale() {
        let mut b = crate::shared::models::FunctionBuilder::new(
            "f",
            Signature::new(Vec::new(), Type::Void),
        );
        b.ret(None);
        let mut func = b.finish();
        let call = CallDesc::direct(CallSiteRef::new(BlockId(0), 5), FuncId(0));
        let err = patch_direct(&mut func, "f", &call, FuncId(1), Vec::new()).unwrap_err();
        assert!(matches!(err, PoolError::StaleCallSite { .. }));
    }

    #[test]
    fn test_retarget_fn_values_only_touches_class_clones() {
        let mut module = Module::default();
        let mut b = crate::shared::models::FunctionBuilder::new(
            "f",
            Signature::new(Vec::new(), Type::Void),
        );
        let slot = b.local(Type::ptr_to(Type::Void), "slot");
        b.push(Inst::Store { value: Operand::Func(FuncId(5)), ptr: Operand::Local(slot) });
        b.push(Inst::Store { value: Operand::Func(FuncId(6)), ptr: Operand::Local(slot) });
        b.ret(None);
        let f = module.add_function(b.finish());

        let mut clone_map = FxHashMap::default();
        clone_map.insert(FuncId(5), FuncId(8));
        CallRewriter::retarget_fn_values(&mut module, f, &clone_map);

        let insts = &module.func(f).blocks[0].insts;
        assert_eq!(insts[0], Inst::Store { value: Operand::Func(FuncId(8)), ptr: Operand::Local(slot) });
        assert_eq!(insts[1], Inst::Store { value: Operand::Func(FuncId(6)), ptr: Operand::Local(slot) });
    }
}
