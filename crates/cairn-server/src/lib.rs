//! HTTP mirror server for cairn records.
//!
//! Hosts any [`Transport`](cairn_transport::Transport) behind the mirror
//! protocol so that remote clients can replicate records into it and read
//! them back.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::MirrorServer;
