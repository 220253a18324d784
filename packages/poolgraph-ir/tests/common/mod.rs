//! Shared fixtures for integration tests

use poolgraph_ir::features::shape_graph::{CallSiteRef, ShapeAnalysis, ShapeOracle};
use poolgraph_ir::shared::models::{BlockId, Module};

/// Oracle that hands back a prebuilt analysis
pub struct FixedOracle {
    pub analysis: ShapeAnalysis,
}

impl FixedOracle {
    pub fn new(analysis: ShapeAnalysis) -> Self {
        Self { analysis }
    }
}

impl ShapeOracle for FixedOracle {
    fn analyze(&self, _module: &Module) -> ShapeAnalysis {
        self.analysis.clone()
    }
}

/// Shorthand for a call-site reference
pub fn site(block: u32, inst: usize) -> CallSiteRef {
    CallSiteRef::new(BlockId(block), inst)
}
