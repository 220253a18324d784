//! Argument-vector tracking
//!
//! Identifies every program value derived from the process argument vector:
//! start at `main`'s argv parameter, chase casts, element pointers and
//! loads, step into callees where the value is passed as an argument, and
//! track stores into globals together with the loads back out of them.
//!
//! The transform consumes the result only as a refinement: memory behind
//! argv is owned by the operating system, so nodes reached through these
//! values must not be mistaken for poolable heap structures. Running
//! without this pass costs precision, never correctness.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::features::shape_graph::ScalarRef;
use crate::shared::models::{Callee, FuncId, GlobalId, Inst, LocalId, Module, Operand};

/// Values known to derive from the argument vector
#[derive(Debug, Default, Clone)]
pub struct ArgvValues {
    pub locals: FxHashSet<(FuncId, LocalId)>,
    pub globals: FxHashSet<GlobalId>,
}

impl ArgvValues {
    /// Does `scalar` in function `f` derive from argv?
    pub fn covers(&self, f: FuncId, scalar: ScalarRef) -> bool {
        match scalar {
            ScalarRef::Local(l) => self.locals.contains(&(f, l)),
            ScalarRef::Global(g) => self.globals.contains(&g),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty() && self.globals.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Item {
    Local(FuncId, LocalId),
    Global(GlobalId),
}

/// Whole-module argv walk
pub struct ArgvTracker;

impl ArgvTracker {
    pub fn run(module: &Module) -> ArgvValues {
        let mut out = ArgvValues::default();
        let Some(main) = module.find("main") else { return out };
        if module.func(main).is_declaration || module.func(main).param_count() < 2 {
            return out;
        }

        let mut work = vec![Item::Local(main, LocalId(1))];
        while let Some(item) = work.pop() {
            match item {
                Item::Local(f, v) => {
                    if !out.locals.insert((f, v)) {
                        continue;
                    }
                    Self::walk_users(module, f, v, &mut work);
                }
                Item::Global(g) => {
                    if !out.globals.insert(g) {
                        continue;
                    }
                    // loads back out of the global are argv-derived too
                    for (fi, func) in module.functions.iter().enumerate() {
                        let f = FuncId(fi as u32);
                        for block in &func.blocks {
                            for inst in &block.insts {
                                if let Inst::Load { dst, ptr: Operand::Global(src) } = inst {
                                    if *src == g {
                                        work.push(Item::Local(f, *dst));
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        debug!(
            target: "poolgraph",
            locals = out.locals.len(),
            globals = out.globals.len(),
            "argv tracking complete"
        );
        out
    }

    /// Push every value one use-step away from `v` in `f`
    fn walk_users(module: &Module, f: FuncId, v: LocalId, work: &mut Vec<Item>) {
        let needle = Operand::Local(v);
        for block in &module.func(f).blocks {
            for inst in &block.insts {
                match inst {
                    Inst::Cast { dst, value } if *value == needle => {
                        work.push(Item::Local(f, *dst));
                    }
                    Inst::Gep { dst, base, .. } if *base == needle => {
                        work.push(Item::Local(f, *dst));
                    }
                    Inst::Load { dst, ptr } if *ptr == needle => {
                        work.push(Item::Local(f, *dst));
                    }
                    Inst::Store { value, ptr } if *value == needle => {
                        if let Operand::Global(g) = ptr {
                            work.push(Item::Global(*g));
                        }
                    }
                    Inst::Call { callee: Callee::Direct(target), args, .. } => {
                        if module.func(*target).is_declaration {
                            continue;
                        }
                        for (i, arg) in args.iter().enumerate() {
                            if *arg == needle && i < module.func(*target).param_count() {
                                work.push(Item::Local(*target, LocalId(i as u32)));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
