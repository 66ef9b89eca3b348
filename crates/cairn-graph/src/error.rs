//! Error types for graph decomposition and reassembly.

use cairn_canon::CanonError;
use cairn_types::{NodeId, ObjectHash};

/// Structural errors in an object graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    /// The graph has no root node to start from.
    #[error("graph has no root node")]
    NoRoot,

    /// A link points at a node id that is not in the graph.
    #[error("link to unknown node {0}")]
    UnknownNode(NodeId),

    /// A link leads back to a node that is still being decomposed.
    #[error("cycle detected through node {node}")]
    Cycle {
        /// The node reached twice on the same path.
        node: NodeId,
    },

    /// A node could not be canonicalized.
    #[error("canonical encoding failed: {0}")]
    Canon(#[from] CanonError),

    /// Reassembly was asked for a root that was never inserted.
    #[error("missing record {0}")]
    MissingRecord(ObjectHash),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
