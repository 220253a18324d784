//! Indirect-call graph inlining
//!
//! Direct calls are already folded into caller graphs by the oracle;
//! indirect calls are not, because their targets only became known during
//! classification. This pass propagates candidate callee graphs into caller
//! graphs along indirect call edges so planning sees the full
//! interprocedural picture.
//!
//! The walk is a memoized fixpoint over an explicit call graph: a global
//! `settled` set guarantees each function is inlined exactly once, a
//! per-path `in_progress` set guards cycles, and both travel as parameters.
//! Cost is linear in (function, indirect-call-site) pairs. Mutually
//! recursive candidates are not assumed to share a merged graph upstream;
//! after the walk, every multi-member strongly connected component of the
//! indirect call graph is re-merged to a fixpoint locally, which the
//! idempotent merge makes cheap.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::features::call_classes::CallSiteTargets;
use crate::features::shape_graph::{CallDesc, ShapeAnalysis};
use crate::shared::models::{FuncId, Module};

/// Propagates callee node graphs across indirect call edges
pub struct GraphInliner<'a> {
    targets: &'a CallSiteTargets,
    settled: FxHashSet<FuncId>,
}

impl<'a> GraphInliner<'a> {
    pub fn new(targets: &'a CallSiteTargets) -> Self {
        Self { targets, settled: FxHashSet::default() }
    }

    /// Inline every function's indirect callees, then unify cycles.
    pub fn run(&mut self, module: &Module, analysis: &mut ShapeAnalysis) {
        for f in module.defined_ids() {
            if analysis.graph(f).is_none() {
                continue;
            }
            let mut in_progress = FxHashSet::default();
            self.inline_into(f, module, analysis, &mut in_progress);
        }
        self.unify_cycles(module, analysis);
    }

    /// Depth-first: settle every unsettled, not-in-progress candidate before
    /// merging its graph at the call site. Settled functions are never
    /// inlined twice.
    fn inline_into(
        &mut self,
        f: FuncId,
        module: &Module,
        analysis: &mut ShapeAnalysis,
        in_progress: &mut FxHashSet<FuncId>,
    ) {
        if self.settled.contains(&f) {
            return;
        }
        in_progress.insert(f);

        let sites: Vec<CallDesc> = analysis
            .graph(f)
            .map(|g| g.calls.iter().filter(|c| c.is_indirect()).cloned().collect())
            .unwrap_or_default();

        for call in &sites {
            let candidates: Vec<FuncId> = self.targets.targets(&(f, call.site)).to_vec();
            for target in candidates {
                if module.func(target).is_declaration {
                    continue;
                }
                if !self.settled.contains(&target) && !in_progress.contains(&target) {
                    self.inline_into(target, module, analysis, in_progress);
                }
                merge_at(f, call, target, module, analysis);
            }
        }

        self.settled.insert(f);
        in_progress.remove(&f);
    }

    /// Local unification for mutual recursion: within each multi-member SCC
    /// of the indirect call graph, keep re-merging sibling graphs until no
    /// merge introduces a node.
    fn unify_cycles(&self, module: &Module, analysis: &mut ShapeAnalysis) {
        let mut call_graph: DiGraphMap<FuncId, ()> = DiGraphMap::new();
        for (&(caller, _site), targets) in self.targets.iter() {
            for &t in targets {
                if !module.func(t).is_declaration {
                    call_graph.add_edge(caller, t, ());
                }
            }
        }

        for scc in tarjan_scc(&call_graph) {
            if scc.len() < 2 {
                continue;
            }
            let members: FxHashSet<FuncId> = scc.iter().copied().collect();
            loop {
                let mut copied = 0;
                for &f in &scc {
                    let sites: Vec<CallDesc> = analysis
                        .graph(f)
                        .map(|g| g.calls.iter().filter(|c| c.is_indirect()).cloned().collect())
                        .unwrap_or_default();
                    for call in &sites {
                        for &t in self.targets.targets(&(f, call.site)) {
                            if t != f && members.contains(&t) {
                                copied += merge_at(f, call, t, module, analysis);
                            }
                        }
                    }
                }
                if copied == 0 {
                    break;
                }
                debug!(target: "poolgraph", scc = scc.len(), copied, "re-merging recursive class");
            }
        }
    }
}

/// Merge `callee`'s graph into `caller`'s at `call`. Returns the number of
/// nodes the merge introduced.
fn merge_at(
    caller: FuncId,
    call: &CallDesc,
    callee: FuncId,
    module: &Module,
    analysis: &mut ShapeAnalysis,
) -> usize {
    if caller == callee {
        // self-recursion merges a graph into itself, which changes nothing
        return 0;
    }
    let Some(mut caller_graph) = analysis.graphs.remove(&caller) else { return 0 };
    let copied = match analysis.graph(callee) {
        Some(callee_graph) => {
            caller_graph.merge_in_graph(call, module.func(callee), callee_graph)
        }
        None => 0,
    };
    analysis.graphs.insert(caller, caller_graph);
    copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::call_classes::IndirectCallClassifier;
    use crate::features::shape_graph::{CallSiteRef, GraphBuilder, NodeFlags};
    use crate::pipeline::diagnostics::DiagnosticSink;
    use crate::shared::models::{
        Block, BlockId, Function, Signature, Terminator, Type,
    };

    fn defined(name: &str) -> Function {
        let mut f = Function::declaration(name, Signature::new(Vec::new(), Type::Void));
        f.is_declaration = false;
        f.blocks.push(Block { insts: Vec::new(), term: Terminator::Return(None) });
        f
    }

    #[test]
    fn test_candidate_graph_is_inlined_into_caller() {
        let mut module = Module::default();
        let caller = module.add_function(defined("caller"));
        let callee = module.add_function(defined("callee"));

        let mut cb = GraphBuilder::new();
        let fp = cb.node(Type::Opaque, NodeFlags::default());
        cb.callees(fp, vec![callee]);
        cb.call(crate::features::shape_graph::CallDesc::indirect(
            CallSiteRef::new(BlockId(0), 0),
            fp,
        ));
        let caller_graph = cb.build();

        let mut eb = GraphBuilder::new();
        eb.node(Type::Named("node".into(), 16), NodeFlags::default().with_heap().with_global());
        let callee_graph = eb.build();

        let mut analysis = ShapeAnalysis::default();
        analysis.insert(caller, caller_graph);
        analysis.insert(callee, callee_graph);

        let mut sink = DiagnosticSink::default();
        let classified = IndirectCallClassifier::classify(&module, &analysis, &mut sink);
        GraphInliner::new(&classified.targets).run(&module, &mut analysis);

        // caller gained the callee's heap node
        let g = analysis.graph(caller).unwrap();
        assert_eq!(g.nodes.len(), 2);
        assert!(g.nodes.iter().any(|n| n.flags.heap && n.flags.global));
    }

    #[test]
    fn test_mutual_recursion_reaches_a_fixpoint() {
        let mut module = Module::default();
        let a = module.add_function(defined("a"));
        let b = module.add_function(defined("b"));

        let mut ab = GraphBuilder::new();
        let fp_a = ab.node(Type::Opaque, NodeFlags::default());
        ab.callees(fp_a, vec![b]);
        ab.call(crate::features::shape_graph::CallDesc::indirect(
            CallSiteRef::new(BlockId(0), 0),
            fp_a,
        ));
        ab.node(Type::Named("anode".into(), 8), NodeFlags::default().with_heap().with_global());

        let mut bb = GraphBuilder::new();
        let fp_b = bb.node(Type::Opaque, NodeFlags::default());
        bb.callees(fp_b, vec![a]);
        bb.call(crate::features::shape_graph::CallDesc::indirect(
            CallSiteRef::new(BlockId(0), 0),
            fp_b,
        ));
        bb.node(Type::Named("bnode".into(), 8), NodeFlags::default().with_heap().with_global());

        let mut analysis = ShapeAnalysis::default();
        analysis.insert(a, ab.build());
        analysis.insert(b, bb.build());

        let mut sink = DiagnosticSink::default();
        let classified = IndirectCallClassifier::classify(&module, &analysis, &mut sink);
        GraphInliner::new(&classified.targets).run(&module, &mut analysis);

        // both ended with both heap nodes; repeat runs change nothing
        let a_nodes = analysis.graph(a).unwrap().nodes.len();
        let b_nodes = analysis.graph(b).unwrap().nodes.len();
        let a_heap =
            analysis.graph(a).unwrap().nodes.iter().filter(|n| n.flags.heap).count();
        let b_heap =
            analysis.graph(b).unwrap().nodes.iter().filter(|n| n.flags.heap).count();
        assert_eq!(a_heap, 2);
        assert_eq!(b_heap, 2);

        GraphInliner::new(&classified.targets).run(&module, &mut analysis);
        assert_eq!(analysis.graph(a).unwrap().nodes.len(), a_nodes);
        assert_eq!(analysis.graph(b).unwrap().nodes.len(), b_nodes);
    }
}
