//! Pool lifetime insertion
//!
//! Every heap node a function owns locally (heap, not received as a
//! parameter, not argv-excluded) gets one pool: created at entry before
//! anything else runs, destroyed immediately before the terminator of
//! every returning block: one destroy per path, never shared, never
//! omitted.
//!
//! Descriptor assignment and instruction surgery are split so call and
//! allocation rewriting can run in between while call-site indices still
//! address the pristine body.

use tracing::debug;

use crate::errors::{PoolError, Result};
use crate::features::pool_plan::{FunctionPoolInfo, PoolSource};
use crate::features::shape_graph::{NodeGraph, NodeId};
use crate::pipeline::diagnostics::{Diagnostic, DiagnosticSink};
use crate::shared::models::{FuncId, Inst, LocalId, Module, Operand, Type};

/// One locally owned pool awaiting instruction surgery
#[derive(Debug, Clone, Copy)]
pub struct OwnedPool {
    pub node: NodeId,
    pub local: LocalId,
    pub elem_size: u32,
}

/// Inserts create/destroy brackets for locally owned pools
pub struct PoolLifetime;

impl PoolLifetime {
    /// Decide which nodes `f` owns and allocate a descriptor local for each
    /// in `body`. Element sizes come from the node type; collapsed types
    /// fall back to one byte with a diagnostic.
    pub fn assign(
        module: &mut Module,
        body: FuncId,
        graph: &NodeGraph,
        info: &mut FunctionPoolInfo,
        fname: &str,
        sink: &mut DiagnosticSink,
    ) -> Result<Vec<OwnedPool>> {
        let owned_nodes: Vec<NodeId> = graph
            .node_ids()
            .filter(|&n| {
                graph.node(n).flags.heap && !info.is_live(n) && !info.excluded.contains(&n)
            })
            .collect();

        let mut owned = Vec::with_capacity(owned_nodes.len());
        for node in owned_nodes {
            if info.descriptors.contains_key(&node) {
                return Err(PoolError::inconsistency(
                    fname,
                    format!("node {} is both received and locally owned", node.0),
                ));
            }
            let elem_size = match graph.node(node).ty.byte_size() {
                Some(size) => size,
                None => {
                    sink.emit(Diagnostic::TypeCollapse { function: fname.to_string(), node });
                    1
                }
            };
            let local = module
                .func_mut(body)
                .add_local(Type::PoolHandle, format!("pool{}", node.0));
            info.descriptors.insert(node, PoolSource::Local(local));
            owned.push(OwnedPool { node, local, elem_size });
        }
        Ok(owned)
    }

    /// Splice the create operations at function entry (in node order) and
    /// append one destroy per pool before every return. Returns the number
    /// of pools created.
    pub fn insert_ops(module: &mut Module, body: FuncId, owned: &[OwnedPool]) -> usize {
        if owned.is_empty() {
            return 0;
        }
        let func = module.func_mut(body);
        let creates: Vec<Inst> = owned
            .iter()
            .map(|p| Inst::PoolCreate { dst: p.local, elem_size: p.elem_size, freeable: true })
            .collect();
        func.blocks[0].insts.splice(0..0, creates);

        for bb in func.return_blocks() {
            for pool in owned {
                func.block_mut(bb)
                    .insts
                    .push(Inst::PoolDestroy { pool: Operand::Local(pool.local) });
            }
        }
        debug!(target: "poolgraph", function = %func.name, pools = owned.len(), "pools bracketed");
        owned.len()
    }
}
