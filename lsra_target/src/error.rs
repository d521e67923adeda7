//! Errors raised while building register requirements.
//!
//! Every error is fatal for the method being built. Other methods are
//! unaffected.

use lsra_ir::value::NodeRef;
use thiserror::Error;

/// Failure to build the requirements of one method.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The input IR breaks a contract lowering must uphold; a compiler
    /// defect upstream of the builder.
    #[error("invariant violation at {node} ({oper}): {message}")]
    InvariantViolation {
        node: NodeRef,
        oper: &'static str,
        message: String,
    },

    /// A known gap: the operator has no register policy on this target.
    #[error("{oper} at {node} is not implemented for {target}")]
    NotImplemented {
        node: NodeRef,
        oper: &'static str,
        target: &'static str,
    },

    /// The input IR failed structural verification.
    #[error("input IR failed verification: {0}")]
    Verify(String),
}

impl BuildError {
    /// Whether this is a capability gap rather than a defect.
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, BuildError::NotImplemented { .. })
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
