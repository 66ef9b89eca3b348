use cairn_types::ObjectHash;

/// Errors from transport operations.
///
/// Every variant names the transport it came from so fan-out failures stay
/// attributable.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The requested record does not exist on this transport.
    #[error("{transport}: record not found: {hash}")]
    NotFound { transport: String, hash: ObjectHash },

    /// A record could not be written.
    #[error("{transport}: failed to persist {hash}: {reason}")]
    Persist {
        transport: String,
        hash: ObjectHash,
        reason: String,
    },

    /// A record exists but could not be read back.
    #[error("{transport}: failed to fetch {hash}: {reason}")]
    Fetch {
        transport: String,
        hash: ObjectHash,
        reason: String,
    },

    /// Stored bytes do not decode or do not match their hash.
    #[error("{transport}: corrupt record {hash}: {reason}")]
    Corrupt {
        transport: String,
        hash: ObjectHash,
        reason: String,
    },

    /// The transport has been shut down.
    #[error("{transport}: transport is closed")]
    Closed { transport: String },

    /// Any other backend failure not tied to one record.
    #[error("{transport}: {reason}")]
    Backend { transport: String, reason: String },
}

impl TransportError {
    /// Name of the transport that raised this error.
    pub fn transport(&self) -> &str {
        match self {
            Self::NotFound { transport, .. }
            | Self::Persist { transport, .. }
            | Self::Fetch { transport, .. }
            | Self::Corrupt { transport, .. }
            | Self::Closed { transport }
            | Self::Backend { transport, .. } => transport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
