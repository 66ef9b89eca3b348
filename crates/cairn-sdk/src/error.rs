use std::time::Duration;

use thiserror::Error;

use cairn_graph::GraphError;
use cairn_transport::TransportError;
use cairn_types::{ObjectHash, TypeError};

#[derive(Debug, Error)]
pub enum SdkError {
    /// A record needed to rebuild a graph is not in the primary store.
    #[error("record not found: {hash}")]
    NotFound { hash: ObjectHash },

    /// The graph cannot be decomposed or reassembled. Nothing was written.
    #[error("structural error: {0}")]
    Structural(#[from] GraphError),

    /// The primary transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The primary transport did not finish writing in time.
    #[error("{transport} did not complete within {waited:?}")]
    Timeout { transport: String, waited: Duration },

    /// A fetched record does not parse or does not match its hash.
    #[error("corrupt record {hash}: {reason}")]
    Corrupt { hash: ObjectHash, reason: String },

    #[error("graph error: {0}")]
    Graph(#[from] TypeError),

    #[error("invalid json: {0}")]
    Json(String),

    #[error("store error: {0}")]
    Store(#[from] cairn_sqlite::StoreError),

    #[error("remote error: {0}")]
    Remote(#[from] cairn_remote::RemoteError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
