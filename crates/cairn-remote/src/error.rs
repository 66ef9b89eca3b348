use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid mirror url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("mirror transports must be created inside a tokio runtime")]
    NoRuntime,

    #[error("mirror {name} returned status {status}: {message}")]
    Status {
        name: String,
        status: u16,
        message: String,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] cairn_protocol::ProtocolError),
}

pub type RemoteResult<T> = Result<T, RemoteError>;
