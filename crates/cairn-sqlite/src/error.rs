use std::io;

use cairn_transport::TransportError;
use cairn_types::ObjectHash;

/// Errors produced by the local store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error creating the store directory or the writer thread.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// No record with this hash has been committed.
    #[error("record not found: {0}")]
    NotFound(ObjectHash),

    /// A stored blob failed to decompress.
    #[error("corrupt record {hash}: {reason}")]
    Corrupt { hash: ObjectHash, reason: String },

    /// Neither a store path nor a data directory is available.
    #[error("no data directory available; set `path` or `root` in the store config")]
    NoDataDir,

    /// The store has been shut down and accepts no more writes.
    #[error("store is shut down")]
    Closed,
}

impl StoreError {
    /// Convert into a [`TransportError`] attributed to `transport`.
    pub fn into_transport(self, transport: &str, hash: Option<ObjectHash>) -> TransportError {
        let transport = transport.to_string();
        match (self, hash) {
            (Self::NotFound(hash), _) => TransportError::NotFound { transport, hash },
            (Self::Corrupt { hash, reason }, _) => TransportError::Corrupt {
                transport,
                hash,
                reason,
            },
            (Self::Closed, _) => TransportError::Closed { transport },
            (other, Some(hash)) => TransportError::Fetch {
                transport,
                hash,
                reason: other.to_string(),
            },
            (other, None) => TransportError::Backend {
                transport,
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience alias used throughout the store crate.
pub type StoreResult<T> = Result<T, StoreError>;
