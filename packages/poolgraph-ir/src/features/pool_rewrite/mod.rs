//! Body rewriting
//!
//! The three passes that turn a planned, cloned program into a pool-using
//! one: call retargeting, pool lifetime bracketing, and allocation
//! redirection. All three address instructions by the call-site references
//! the oracle reported, so the driver runs the in-place rewrites before
//! any instruction is inserted.

pub mod alloc_rewriter;
pub mod call_rewriter;
pub mod lifetime;

pub use alloc_rewriter::AllocRewriter;
pub use call_rewriter::CallRewriter;
pub use lifetime::{OwnedPool, PoolLifetime};
