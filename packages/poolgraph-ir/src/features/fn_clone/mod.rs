//! Function cloning
//!
//! Whole-body cloning under a partial value remap, plus the policy for
//! when a clone is required at all.

pub mod cloner;
pub mod remap;

pub use cloner::FunctionCloner;
pub use remap::{clone_blocks, ValueMap};
