use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("graph has no root node")]
    NoRoot,

    #[error("cycle detected through node {0}")]
    Cycle(NodeId),
}
