//! Whole-program pool transformation driver
//!
//! Stage order is load-bearing: classify → inline → plan **every** function
//! → clone **every** original function → rewrite. Planning must finish for
//! the whole program before any cloning starts, because a class watermark
//! assigned while planning one member can still be advanced by a sibling
//! planned later; interleaving the phases would produce inconsistent
//! arities. Rewriting likewise waits until every clone it may reference
//! exists. The run is single-threaded and run-to-completion; per-function
//! structural inconsistencies are reported in the summary, recoverable
//! conditions degrade with diagnostics, and the rest of the program is
//! still transformed.

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use super::diagnostics::{DiagnosticSink, FailedFunction, TransformSummary};
use crate::errors::Result;
use crate::features::argv_trace::ArgvValues;
use crate::features::call_classes::IndirectCallClassifier;
use crate::features::fn_clone::FunctionCloner;
use crate::features::graph_inline::GraphInliner;
use crate::features::pool_plan::{PlanningContext, PoolPlanner, Stage};
use crate::features::pool_rewrite::{AllocRewriter, CallRewriter, PoolLifetime};
use crate::features::shape_graph::{ShapeAnalysis, ShapeOracle};
use crate::shared::models::{FuncId, Module};

/// The pool allocation transform
#[derive(Debug, Default)]
pub struct PoolTransform<'a> {
    argv: Option<&'a ArgvValues>,
}

impl<'a> PoolTransform<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refine planning with argument-vector provenance
    pub fn with_argv(mut self, argv: &'a ArgvValues) -> Self {
        self.argv = Some(argv);
        self
    }

    /// Analyze with `oracle`, then transform
    pub fn run_with_oracle<O: ShapeOracle>(
        &self,
        module: &mut Module,
        oracle: &O,
    ) -> Result<TransformSummary> {
        let analysis = oracle.analyze(module);
        self.run(module, analysis)
    }

    /// Transform `module` in place against a precomputed shape analysis
    pub fn run(&self, module: &mut Module, mut analysis: ShapeAnalysis) -> Result<TransformSummary> {
        let mut summary = TransformSummary::default();
        let mut sink = DiagnosticSink::default();

        // Empty program: nothing to do, not an error.
        let originals: Vec<FuncId> = module.defined_ids();
        if originals.is_empty() {
            return Ok(summary);
        }

        // 1. union candidate targets of each indirect call site
        let IndirectCallClassifier { mut classes, targets } =
            IndirectCallClassifier::classify(module, &analysis, &mut sink);

        // 2. propagate callee graphs along indirect edges, then fold the
        //    globals graph into every function once
        GraphInliner::new(&targets).run(module, &mut analysis);
        let globals = analysis.globals.clone();
        for &f in &originals {
            if let Some(graph) = analysis.graph_mut(f) {
                graph.merge_globals(&globals);
            }
        }

        // 3. plan everything (first phase of the barrier)
        let mut ctx = PlanningContext::new();
        {
            let mut planner = PoolPlanner::new(&mut classes, self.argv);
            for &f in &originals {
                planner.plan_function(module, f, &analysis, &mut ctx);
            }
        }

        // 4. clone everything that needs it; `originals` was captured before
        //    this loop, so appended clones are never re-processed
        {
            let mut cloner = FunctionCloner::new(&mut classes);
            for &f in &originals {
                let before = module.func(f).param_count();
                if let Some(clone) = cloner.clone_function(module, f, &mut ctx) {
                    summary.functions_cloned += 1;
                    summary.args_added += module.func(clone).param_count() - before;
                    ctx.set_stage(f, Stage::Cloned);
                }
            }
        }

        // 5. rewrite each original's surviving body
        let mut rewriter = CallRewriter::new(&mut classes, &targets);
        let clone_map = rewriter.class_clone_map(&ctx, module);
        for &f in &originals {
            match rewrite_function(
                module,
                f,
                &analysis,
                &mut ctx,
                &mut rewriter,
                &clone_map,
                &mut sink,
            ) {
                Ok(pools) => {
                    summary.pools_inserted += pools;
                    let transformed =
                        pools > 0 || ctx.info(f).map(|i| i.clone.is_some()).unwrap_or(false);
                    if transformed {
                        ctx.set_stage(f, Stage::Rewritten);
                    }
                }
                Err(err) => {
                    let function = module.func(f).name.clone();
                    warn!(target: "poolgraph", %function, %err, "function left untransformed");
                    summary.failures.push(FailedFunction { function, error: err.to_string() });
                }
            }
        }

        summary.diagnostics = sink.into_items();
        info!(
            target: "poolgraph",
            args_added = summary.args_added,
            cloned = summary.functions_cloned,
            pools = summary.pools_inserted,
            "pool transformation complete"
        );
        Ok(summary)
    }
}

/// Create descriptors, rewrite calls and allocations in place, then splice
/// the lifetime brackets. In-place rewrites run first so oracle call-site
/// indices still address the pristine body.
#[allow(clippy::too_many_arguments)]
fn rewrite_function(
    module: &mut Module,
    f: FuncId,
    analysis: &ShapeAnalysis,
    ctx: &mut PlanningContext,
    rewriter: &mut CallRewriter<'_>,
    clone_map: &FxHashMap<FuncId, FuncId>,
    sink: &mut DiagnosticSink,
) -> Result<usize> {
    let Some(graph) = analysis.graph(f) else { return Ok(0) };
    if graph.is_empty() && graph.calls.is_empty() {
        return Ok(0);
    }
    let fname = module.func(f).name.clone();
    let body = ctx.info(f).and_then(|i| i.clone).unwrap_or(f);

    let owned = match ctx.info_mut(f) {
        Some(info) => PoolLifetime::assign(module, body, graph, info, &fname, sink)?,
        None => Vec::new(),
    };

    rewriter.rewrite(module, f, body, analysis, ctx)?;
    if let Some(info) = ctx.info(f) {
        AllocRewriter::rewrite(module, body, graph, info);
    }
    let pools = PoolLifetime::insert_ops(module, body, &owned);
    CallRewriter::retarget_fn_values(module, body, clone_map);
    Ok(pools)
}
