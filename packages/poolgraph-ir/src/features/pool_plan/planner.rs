//! Liveness marking and slot assignment
//!
//! A heap node is live when its storage must be visible outside the
//! function that creates it: it is global, incomplete, reachable from such
//! a node, or it backs the return value. Live nodes become injected
//! pool-handle parameters; slot numbers are shared across an equivalence
//! class through the watermark in [`PlanningContext`].
//!
//! The contract is "slot k is a pool handle", not "slot k is the same data
//! structure in every member". That is what lets one indirect call site
//! use one fixed-arity convention across all candidates.

use rustc_hash::FxHashSet;
use tracing::debug;

use super::context::{FunctionPoolInfo, PlanningContext, Stage};
use crate::features::argv_trace::ArgvValues;
use crate::features::call_classes::FuncUnionFind;
use crate::features::shape_graph::{NodeId, ShapeAnalysis};
use crate::shared::models::{FuncId, Module};

/// Decides which nodes each function receives as parameters
pub struct PoolPlanner<'a> {
    classes: &'a mut FuncUnionFind,
    argv: Option<&'a ArgvValues>,
}

impl<'a> PoolPlanner<'a> {
    pub fn new(classes: &'a mut FuncUnionFind, argv: Option<&'a ArgvValues>) -> Self {
        Self { classes, argv }
    }

    /// Plan one function. Must run for every function in the program before
    /// any cloning starts: a class watermark assigned here can still be
    /// advanced by a sibling planned later.
    pub fn plan_function(
        &mut self,
        module: &Module,
        f: FuncId,
        analysis: &ShapeAnalysis,
        ctx: &mut PlanningContext,
    ) {
        let func = module.func(f);
        if func.is_declaration {
            return;
        }

        let mut info = FunctionPoolInfo::default();
        let class = self.classes.find(f);
        info.slot_first = class.map(|rep| ctx.reserved(rep)).unwrap_or(0);

        let Some(graph) = analysis.graph(f) else {
            // no memory activity, nothing is required
            ctx.insert_info(f, info);
            ctx.set_stage(f, Stage::PlannedDead);
            return;
        };
        ctx.set_stage(f, Stage::GraphMerged);

        if graph.is_empty() {
            ctx.insert_info(f, info);
            ctx.set_stage(f, Stage::PlannedDead);
            return;
        }

        // argv-derived nodes are OS-owned storage, not poolable heap data
        if let Some(argv) = self.argv {
            for &(scalar, node) in &graph.scalars {
                if argv.covers(f, scalar) {
                    info.excluded.insert(node);
                }
            }
        }

        let from_globals = graph.nodes_from_globals();

        // Mark globals and incomplete nodes as live, plus everything they
        // reach. main keeps its pools local: nothing outlives the program.
        let mut marked: FxHashSet<NodeId> = FxHashSet::default();
        if func.name != "main" {
            for node in &graph.nodes {
                if !node.flags.heap {
                    continue;
                }
                if node.flags.incomplete
                    || node.flags.global
                    || from_globals.contains(&node.id)
                {
                    graph.mark_reachable(node.id, &mut marked);
                }
            }
        }

        // the returned node's storage must outlive the call
        if let Some(ret) = graph.return_node {
            if graph.node(ret).flags.heap {
                graph.mark_reachable(ret, &mut marked);
            }
        }

        // slot assignment is restricted to heap nodes, in creation order
        info.live = graph
            .node_ids()
            .filter(|n| {
                marked.contains(n) && graph.node(*n).flags.heap && !info.excluded.contains(n)
            })
            .collect();

        let count = info.live_count();
        if count > 0 {
            if let Some(rep) = class {
                let first = ctx.reserve(rep, count);
                debug_assert_eq!(first, info.slot_first);
            }
            debug!(
                target: "poolgraph",
                function = %func.name,
                live = count,
                slot_first = info.slot_first,
                "planned live"
            );
            ctx.insert_info(f, info);
            ctx.set_stage(f, Stage::PlannedLive);
        } else {
            ctx.insert_info(f, info);
            ctx.set_stage(f, Stage::PlannedDead);
        }
    }
}
