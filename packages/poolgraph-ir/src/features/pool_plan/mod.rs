//! Pool parameter planning
//!
//! Runs over every function after graph inlining, deciding which heap
//! nodes must be received as parameters and assigning each a slot number
//! shared across its function's equivalence class.

pub mod context;
pub mod planner;

pub use context::{FunctionPoolInfo, PlanningContext, PoolSource, Stage};
pub use planner::PoolPlanner;
