//! Feature modules
//!
//! Each feature is a vertical slice of the transform; larger ones follow
//! the domain / ports layering, smaller ones are single modules.
//!
//! Dependency order, leaves first: `shape_graph` (oracle surface) →
//! `call_classes` → `graph_inline` → `pool_plan` → `fn_clone` →
//! `pool_rewrite`, with `argv_trace` as an optional refinement feeding
//! planning.

pub mod argv_trace;
pub mod call_classes;
pub mod fn_clone;
pub mod graph_inline;
pub mod pool_plan;
pub mod pool_rewrite;
pub mod shape_graph;
