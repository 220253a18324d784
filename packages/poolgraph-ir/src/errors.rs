//! Error types for poolgraph-ir
//!
//! Only fatal conditions live here. Recoverable conditions (unresolved
//! indirect targets, collapsed element types) travel through the diagnostic
//! stream in `pipeline::diagnostics` and never abort a run.

use thiserror::Error;

/// Main error type for pool transformation failures
#[derive(Debug, Error)]
pub enum PoolError {
    /// A node or value was seen in two mutually incompatible roles.
    #[error("structural inconsistency in `{function}`: {detail}")]
    StructuralInconsistency { function: String, detail: String },

    /// A call-site reference did not address a call instruction.
    #[error("stale call site in `{function}`: {detail}")]
    StaleCallSite { function: String, detail: String },
}

impl PoolError {
    /// Create a structural inconsistency error with function context
    pub fn inconsistency(function: impl Into<String>, detail: impl Into<String>) -> Self {
        PoolError::StructuralInconsistency {
            function: function.into(),
            detail: detail.into(),
        }
    }

    /// Create a stale call-site error with function context
    pub fn stale_site(function: impl Into<String>, detail: impl Into<String>) -> Self {
        PoolError::StaleCallSite {
            function: function.into(),
            detail: detail.into(),
        }
    }
}

/// Result type alias for pool transformation operations
pub type Result<T> = std::result::Result<T, PoolError>;
