//! Remote mirror transport.
//!
//! [`HttpMirror`] replicates records to a cairn mirror server over HTTP.
//! Persisting only hands records to a background sender task, so a slow or
//! unreachable mirror never holds up the local store or other mirrors.
//! Failed uploads are logged per hash in the mirror's
//! [`WriteTracker`](cairn_transport::WriteTracker), where the serializer
//! collects them into its report.

pub mod config;
pub mod error;
pub mod mirror;

pub use config::MirrorConfig;
pub use error::{RemoteError, RemoteResult};
pub use mirror::HttpMirror;
