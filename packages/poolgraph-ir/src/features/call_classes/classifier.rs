//! Indirect-call equivalence classing
//!
//! Functions that may be interchangeable targets of the same indirect call
//! site must end up with one shared calling convention, so every candidate
//! set is unioned into a single class. The (site, candidate) pairs are kept
//! around for the rewriting phase regardless of class structure.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::union_find::FuncUnionFind;
use crate::features::shape_graph::{CallSiteRef, CallTarget, ShapeAnalysis};
use crate::pipeline::diagnostics::{Diagnostic, DiagnosticSink};
use crate::shared::models::{FuncId, Module};

/// A call site, qualified by its owning function
pub type SiteKey = (FuncId, CallSiteRef);

/// Multimap from indirect call sites to their resolved candidate callees
#[derive(Debug, Default)]
pub struct CallSiteTargets {
    entries: FxHashMap<SiteKey, Vec<FuncId>>,
}

impl CallSiteTargets {
    /// Record one (site, candidate) pair, keeping discovery order
    pub fn record(&mut self, site: SiteKey, target: FuncId) {
        let targets = self.entries.entry(site).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Candidates for `site`, empty when unresolved
    pub fn targets(&self, site: &SiteKey) -> &[FuncId] {
        self.entries.get(site).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteKey, &Vec<FuncId>)> {
        self.entries.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of the classification pass
#[derive(Debug, Default)]
pub struct IndirectCallClassifier {
    pub classes: FuncUnionFind,
    pub targets: CallSiteTargets,
}

impl IndirectCallClassifier {
    /// Walk every indirect call site of every defined function, unioning
    /// candidate callees in discovery order. The first candidate seen at a
    /// site becomes the class representative for later unions.
    pub fn classify(
        module: &Module,
        analysis: &ShapeAnalysis,
        sink: &mut DiagnosticSink,
    ) -> Self {
        let mut out = Self::default();
        for f in module.defined_ids() {
            let Some(graph) = analysis.graph(f) else { continue };
            let fname = &module.func(f).name;
            for call in &graph.calls {
                let CallTarget::Indirect { node } = call.target else { continue };
                let callee_node = graph.node(node);
                if callee_node.flags.incomplete {
                    sink.emit(Diagnostic::IncompleteCalleeNode {
                        function: fname.clone(),
                        site: call.site,
                    });
                }
                if callee_node.callees.is_empty() {
                    sink.emit(Diagnostic::UnresolvedIndirectTarget {
                        function: fname.clone(),
                        site: call.site,
                    });
                    continue;
                }
                let mut running: Option<FuncId> = None;
                for &candidate in &callee_node.callees {
                    out.targets.record((f, call.site), candidate);
                    match running {
                        None => {
                            out.classes.make_set(candidate);
                            running = Some(candidate);
                        }
                        Some(rep) => {
                            out.classes.union(rep, candidate);
                        }
                    }
                }
            }
        }
        debug!(
            target: "poolgraph",
            classes = out.classes.count(),
            "indirect call classification complete"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shape_graph::{CallDesc, GraphBuilder, NodeFlags};
    use crate::shared::models::{BlockId, Function, Signature, Type};

    fn defined(name: &str) -> Function {
        let mut f = Function::declaration(name, Signature::new(Vec::new(), Type::Void));
        f.is_declaration = false;
        f.blocks.push(crate::shared::models::Block {
            insts: Vec::new(),
            term: crate::shared::models::Terminator::Return(None),
        });
        f
    }

    #[test]
    fn test_candidates_of_one_site_share_a_class() {
        let mut module = Module::default();
        let caller = module.add_function(defined("caller"));
        let f = module.add_function(defined("f"));
        let g = module.add_function(defined("g"));

        let mut b = GraphBuilder::new();
        let fp = b.node(Type::Opaque, NodeFlags::default());
        b.callees(fp, vec![f, g]);
        b.call(CallDesc::indirect(CallSiteRef::new(BlockId(0), 0), fp));

        let mut analysis = ShapeAnalysis::default();
        analysis.insert(caller, b.build());

        let mut sink = DiagnosticSink::default();
        let mut out = IndirectCallClassifier::classify(&module, &analysis, &mut sink);
        assert!(out.classes.same_class(f, g));
        assert_eq!(out.targets.targets(&(caller, CallSiteRef::new(BlockId(0), 0))), &[f, g]);
        assert!(sink.items().is_empty());
    }

    #[test]
    fn test_unresolved_site_is_diagnosed_not_fatal() {
        let mut module = Module::default();
        let caller = module.add_function(defined("caller"));

        let mut b = GraphBuilder::new();
        let fp = b.node(Type::Opaque, NodeFlags::default().with_incomplete());
        b.call(CallDesc::indirect(CallSiteRef::new(BlockId(0), 0), fp));

        let mut analysis = ShapeAnalysis::default();
        analysis.insert(caller, b.build());

        let mut sink = DiagnosticSink::default();
        let out = IndirectCallClassifier::classify(&module, &analysis, &mut sink);
        assert!(out.targets.is_empty());
        assert_eq!(sink.items().len(), 2); // incomplete node and no targets
    }

    #[test]
    fn test_sites_chain_classes_together() {
        let mut module = Module::default();
        let caller = module.add_function(defined("caller"));
        let f = module.add_function(defined("f"));
        let g = module.add_function(defined("g"));
        let h = module.add_function(defined("h"));

        let mut b = GraphBuilder::new();
        let fp1 = b.node(Type::Opaque, NodeFlags::default());
        b.callees(fp1, vec![f, g]);
        b.call(CallDesc::indirect(CallSiteRef::new(BlockId(0), 0), fp1));
        let fp2 = b.node(Type::Opaque, NodeFlags::default());
        b.callees(fp2, vec![g, h]);
        b.call(CallDesc::indirect(CallSiteRef::new(BlockId(0), 1), fp2));

        let mut analysis = ShapeAnalysis::default();
        analysis.insert(caller, b.build());

        let mut sink = DiagnosticSink::default();
        let mut out = IndirectCallClassifier::classify(&module, &analysis, &mut sink);
        assert!(out.classes.same_class(f, h));
        assert_eq!(out.classes.count(), 1);
    }
}
