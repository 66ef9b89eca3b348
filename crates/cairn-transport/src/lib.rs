//! Transport abstraction for cairn records.
//!
//! A transport is any destination that can durably hold content-addressed
//! records: the local SQLite store, an HTTP mirror, or the in-memory map used
//! in tests. The serializer fans the same records out to every configured
//! transport and then waits for each to report completion.
//!
//! # Contract
//!
//! 1. Persisting the same hash twice is harmless; the first write wins.
//! 2. `persist` and `persist_many` may return before the data is durable.
//!    [`Transport::is_write_complete`] and [`Transport::wait_for_completion`]
//!    report when everything accepted so far has been written or failed.
//! 3. Asynchronous write failures are never dropped: they land in a failure
//!    log that [`Transport::take_failures`] drains by hash.
//! 4. `fetch` returns exactly the canonical bytes that were persisted.

pub mod error;
pub mod memory;
pub mod traits;
pub mod tracker;

pub use error::{TransportError, TransportResult};
pub use memory::InMemoryTransport;
pub use traits::Transport;
pub use tracker::{WriteFailure, WriteTracker, DEFAULT_FAILURE_CAPACITY};
