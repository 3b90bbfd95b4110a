// model-fuzzing/src/error.rs
//! Error types for the walking engine

use thiserror::Error;

/// Errors surfaced by the model walker.
///
/// Normal exhaustion of a walk is *not* an error: the pull interface simply
/// returns `None`. Everything here is either a construction mistake or a
/// contract breach that must not be silently swallowed.
#[derive(Debug, Error)]
pub enum WalkError {
    /// A consumer emitted contradictory signals for a node (e.g. claimed
    /// continued interest and then refused to consume). This is a bug in the
    /// consumer implementation, never a property of the input tree.
    #[error("consumer protocol violation on node '{node}': {reason}")]
    ProtocolViolation { node: String, reason: String },

    /// The walker was constructed with parameters that contradict each other.
    #[error("invalid walker configuration: {0}")]
    InvalidWalkerConfig(String),
}

impl WalkError {
    pub(crate) fn protocol(node: impl Into<String>, reason: impl Into<String>) -> Self {
        WalkError::ProtocolViolation {
            node: node.into(),
            reason: reason.into(),
        }
    }
}
