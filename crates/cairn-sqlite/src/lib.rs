//! Local persistent record store.
//!
//! [`LocalStore`] keeps canonical records in a single SQLite file, keyed by
//! hash and compressed with zstd. Writes go through a debounced
//! write-behind queue drained by one dedicated thread, so producers never
//! wait on disk I/O; completion is observable through the
//! [`Transport`](cairn_transport::Transport) implementation.
//!
//! # Guarantees
//!
//! - A batch handed to `persist_many` commits in one transaction.
//! - Inserts are `INSERT OR IGNORE`: the first write of a hash wins.
//! - Reads only observe committed records.
//! - Failed commits are logged per hash and never leave writes pending.

pub mod config;
pub mod error;
mod schema;
pub mod store;
mod writer;

pub use config::LocalStoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{LocalStore, ShutdownMode, ShutdownReport, StoreStats, LOCAL_TRANSPORT_NAME};
