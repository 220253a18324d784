//! poolgraph-ir: whole-program pool allocation over a CFG IR
//!
//! Rewrites heap-intensive programs so that logically distinct data
//! structures are allocated from separate memory pools instead of one
//! global heap, improving locality and enabling pool-granularity lifetime
//! management. The points-to/shape analysis is an external oracle; this
//! crate consumes its node graphs and performs the interprocedural
//! transformation:
//!
//! 1. union functions reachable through the same indirect call site into
//!    equivalence classes (`features::call_classes`)
//! 2. propagate callee node graphs across indirect call edges
//!    (`features::graph_inline`)
//! 3. decide which heap nodes each function must receive as pool-handle
//!    parameters and assign class-consistent slots (`features::pool_plan`)
//! 4. clone functions with the injected parameters (`features::fn_clone`)
//! 5. retarget call sites, bracket owned pools with create/destroy, and
//!    redirect allocation sites (`features::pool_rewrite`)
//!
//! `pipeline::PoolTransform` drives the stages with a strict two-phase
//! barrier between planning and cloning.

pub mod errors;
pub mod features;
pub mod pipeline;
pub mod shared;

pub use errors::{PoolError, Result};
pub use features::argv_trace::{ArgvTracker, ArgvValues};
pub use features::shape_graph::{ShapeAnalysis, ShapeOracle};
pub use pipeline::{Diagnostic, PoolTransform, TransformSummary};
