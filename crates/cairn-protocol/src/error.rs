use thiserror::Error;

use cairn_types::ObjectHash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("hash mismatch: declared {declared}, computed {computed}")]
    HashMismatch {
        declared: ObjectHash,
        computed: ObjectHash,
    },

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("batch too large: {size} objects (max {max})")]
    BatchTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote error: status={status}, message={message}")]
    RemoteError { status: u16, message: String },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
