//! Per-function node graph and merge operations
//!
//! Nodes live in a `Vec` in creation order; everything that feeds slot
//! numbering iterates that order, never hash order.
//!
//! Merging one graph into another needs a callee-node to caller-node
//! correspondence. It is seeded two ways and then grown by matching
//! points-to edges positionally:
//! - from the call's argument and return bindings, and
//! - from node provenance: every node copied across graphs remembers the
//!   graph and id it ultimately came from, so a node can never be copied
//!   into the same graph twice.
//!
//! Provenance is what makes merging idempotent and lets mutually recursive
//! functions be unified to a fixpoint without duplicating nodes.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::call_site::CallDesc;
use super::node::{HeapNode, NodeFlags, NodeId};
use crate::shared::models::{FuncId, Function, GlobalId, LocalId, Type};

/// A scalar program value tracked by the shape analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarRef {
    Local(LocalId),
    Global(GlobalId),
}

/// Where a node ultimately came from. `None` as the owner denotes the
/// module-level globals graph.
pub type NodeOrigin = (Option<FuncId>, NodeId);

/// One function's view of the heap
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeGraph {
    /// Function this graph belongs to; `None` for the globals graph
    pub owner: Option<FuncId>,
    /// Creation order; `NodeId` equals the index
    pub nodes: Vec<HeapNode>,
    /// Scalar-to-node bindings, in binding order
    pub scalars: Vec<(ScalarRef, NodeId)>,
    /// Node behind the function's return value
    pub return_node: Option<NodeId>,
    /// Calls made by the function, in body order
    pub calls: Vec<CallDesc>,
    /// Whether the module globals graph has been folded in
    pub globals_merged: bool,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, ty: Type, flags: NodeFlags) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(HeapNode::new(id, ty, flags));
        id
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &HeapNode {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut HeapNode {
        &mut self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Ultimate provenance of `id`: its recorded origin, or this graph
    pub fn origin_of(&self, id: NodeId) -> NodeOrigin {
        self.node(id).origin.unwrap_or((self.owner, id))
    }

    pub fn bind_scalar(&mut self, scalar: ScalarRef, node: NodeId) {
        self.scalars.push((scalar, node));
    }

    pub fn scalar_node(&self, scalar: ScalarRef) -> Option<NodeId> {
        self.scalars.iter().find(|(s, _)| *s == scalar).map(|(_, n)| *n)
    }

    /// Insert `from` and everything reachable from it over points-to edges
    pub fn mark_reachable(&self, from: NodeId, out: &mut FxHashSet<NodeId>) {
        if !out.insert(from) {
            return;
        }
        for &e in &self.node(from).edges {
            self.mark_reachable(e, out);
        }
    }

    /// Closure of every node bound to a global scalar
    pub fn nodes_from_globals(&self) -> FxHashSet<NodeId> {
        let mut out = FxHashSet::default();
        for &(scalar, node) in &self.scalars {
            if matches!(scalar, ScalarRef::Global(_)) {
                self.mark_reachable(node, &mut out);
            }
        }
        out
    }

    /// Pairs of `other` nodes and `self` nodes sharing a provenance
    fn origin_seeds(&self, other: &NodeGraph) -> Vec<(NodeId, NodeId)> {
        let by_origin: FxHashMap<NodeOrigin, NodeId> =
            self.node_ids().map(|id| (self.origin_of(id), id)).collect();
        other
            .node_ids()
            .filter_map(|id| by_origin.get(&other.origin_of(id)).map(|&s| (id, s)))
            .collect()
    }

    /// Grow a node correspondence `other -> self` from seed pairs by walking
    /// matching edge positions. The first binding for a node wins, and seeds
    /// later in the vector are applied first.
    fn extend_map(
        &self,
        other: &NodeGraph,
        seeds: Vec<(NodeId, NodeId)>,
    ) -> FxHashMap<NodeId, NodeId> {
        let mut map = FxHashMap::default();
        let mut work = seeds;
        while let Some((o, s)) = work.pop() {
            if map.contains_key(&o) {
                continue;
            }
            map.insert(o, s);
            let on = other.node(o);
            let sn = self.node(s);
            for (oe, se) in on.edges.iter().zip(sn.edges.iter()) {
                work.push((*oe, *se));
            }
        }
        map
    }

    /// Correspondence from `callee_graph` nodes to this caller graph's nodes
    /// at `call`. Call-site argument/return bindings take precedence over
    /// provenance matches.
    pub fn callee_caller_map(
        &self,
        call: &CallDesc,
        callee_fn: &Function,
        callee_graph: &NodeGraph,
    ) -> FxHashMap<NodeId, NodeId> {
        let mut seeds = self.origin_seeds(callee_graph);
        for i in 0..callee_fn.param_count() {
            let formal = callee_graph.scalar_node(ScalarRef::Local(LocalId(i as u32)));
            if let (Some(cn), Some(Some(an))) = (formal, call.arg_nodes.get(i)) {
                seeds.push((cn, *an));
            }
        }
        if let (Some(crn), Some(arn)) = (callee_graph.return_node, call.ret_node) {
            seeds.push((crn, arn));
        }
        self.extend_map(callee_graph, seeds)
    }

    /// Copy every unmapped node of `other` into this graph (stamping its
    /// provenance), then reconcile flags, element types, edges and candidate
    /// sets. Returns the number of nodes copied.
    fn absorb(&mut self, other: &NodeGraph, map: &mut FxHashMap<NodeId, NodeId>) -> usize {
        let mut copied = 0;
        for src in other.node_ids() {
            if !map.contains_key(&src) {
                let node = other.node(src);
                let id = self.add_node(node.ty.clone(), node.flags);
                self.node_mut(id).origin = Some(other.origin_of(src));
                map.insert(src, id);
                copied += 1;
            }
        }
        for src in other.node_ids() {
            let node = other.node(src).clone();
            let target = map[&src];
            {
                let tn = self.node_mut(target);
                tn.flags.merge(node.flags);
                if tn.ty != node.ty {
                    if tn.ty == Type::Opaque {
                        tn.ty = node.ty.clone();
                    } else if node.ty != Type::Opaque {
                        // incompatible element types collapse the node
                        tn.ty = Type::Opaque;
                    }
                }
            }
            for (i, oe) in node.edges.iter().enumerate() {
                let te = map[oe];
                let tn = self.node_mut(target);
                if i >= tn.edges.len() {
                    tn.edges.push(te);
                }
            }
            for &c in &node.callees {
                let tn = self.node_mut(target);
                if !tn.callees.contains(&c) {
                    tn.callees.push(c);
                }
            }
        }
        copied
    }

    /// Inline `callee_graph` into this caller graph at `call`, preserving
    /// node identity for everything the correspondence already covers.
    /// Returns the number of fresh nodes introduced (zero on repeats).
    pub fn merge_in_graph(
        &mut self,
        call: &CallDesc,
        callee_fn: &Function,
        callee_graph: &NodeGraph,
    ) -> usize {
        let mut map = self.callee_caller_map(call, callee_fn, callee_graph);
        self.absorb(callee_graph, &mut map)
    }

    /// Fold the module-level globals graph in, once per function.
    pub fn merge_globals(&mut self, globals: &NodeGraph) {
        if self.globals_merged {
            return;
        }
        self.globals_merged = true;
        if globals.is_empty() {
            return;
        }
        let mut seeds = self.origin_seeds(globals);
        for &(scalar, gn) in &globals.scalars {
            if let Some(sn) = self.scalar_node(scalar) {
                seeds.push((gn, sn));
            }
        }
        let mut map = self.extend_map(globals, seeds);
        self.absorb(globals, &mut map);
        for &(scalar, gn) in &globals.scalars {
            if self.scalar_node(scalar).is_none() {
                let target = map[&gn];
                self.bind_scalar(scalar, target);
            }
        }
    }
}

/// Builder for assembling node graphs in tests and fixtures
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: NodeGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the owning function (normally done by `ShapeAnalysis::insert`)
    pub fn owner(&mut self, f: FuncId) -> &mut Self {
        self.graph.owner = Some(f);
        self
    }

    pub fn node(&mut self, ty: Type, flags: NodeFlags) -> NodeId {
        self.graph.add_node(ty, flags)
    }

    pub fn edge(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.graph.node_mut(from).edges.push(to);
        self
    }

    pub fn callees(&mut self, node: NodeId, funcs: Vec<FuncId>) -> &mut Self {
        self.graph.node_mut(node).callees = funcs;
        self
    }

    pub fn scalar(&mut self, scalar: ScalarRef, node: NodeId) -> &mut Self {
        self.graph.bind_scalar(scalar, node);
        self
    }

    pub fn returns(&mut self, node: NodeId) -> &mut Self {
        self.graph.return_node = Some(node);
        self
    }

    pub fn call(&mut self, desc: CallDesc) -> &mut Self {
        self.graph.calls.push(desc);
        self
    }

    pub fn build(self) -> NodeGraph {
        self.graph
    }
}

/// Everything the oracle knows about a program
#[derive(Debug, Clone, Default)]
pub struct ShapeAnalysis {
    pub graphs: FxHashMap<FuncId, NodeGraph>,
    /// Module-level graph for global storage; its nodes carry the `None`
    /// owner in provenance terms
    pub globals: NodeGraph,
}

impl ShapeAnalysis {
    pub fn graph(&self, f: FuncId) -> Option<&NodeGraph> {
        self.graphs.get(&f)
    }

    pub fn graph_mut(&mut self, f: FuncId) -> Option<&mut NodeGraph> {
        self.graphs.get_mut(&f)
    }

    /// Register `graph` as function `f`'s view, stamping ownership so node
    /// provenance is unambiguous across merges.
    pub fn insert(&mut self, f: FuncId, mut graph: NodeGraph) {
        graph.owner = Some(f);
        self.graphs.insert(f, graph);
    }
}
