use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use cairn_types::{ObjectHash, Record};

use crate::error::TransportResult;
use crate::tracker::WriteFailure;

/// Interval used by the default [`Transport::wait_for_completion`].
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A destination for content-addressed records.
///
/// Implementations must satisfy these invariants:
/// - Writes are idempotent by hash.
/// - A write that returns `Ok` has been accepted: it will either be committed
///   or show up in [`take_failures`](Self::take_failures).
/// - [`fetch`](Self::fetch) returns the canonical bytes exactly as persisted.
/// - Writes to one transport never block another.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable name used in logs and error reports.
    fn name(&self) -> &str;

    /// Accept one record for writing.
    async fn persist(&self, record: Record) -> TransportResult<()>;

    /// Accept a batch of records for writing.
    ///
    /// Backends that support it commit the batch atomically.
    async fn persist_many(&self, records: Vec<Record>) -> TransportResult<()>;

    /// Read the canonical bytes for `hash`.
    ///
    /// Returns [`TransportError::NotFound`](crate::TransportError::NotFound)
    /// if the record does not exist.
    async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes>;

    /// `true` once every accepted write has been committed or has failed.
    fn is_write_complete(&self) -> bool;

    /// Wait until [`is_write_complete`](Self::is_write_complete) holds.
    ///
    /// The default polls; backends with a [`WriteTracker`](crate::WriteTracker)
    /// override this to wake exactly when the last write settles. Callers
    /// bound the wait with `tokio::time::timeout`.
    async fn wait_for_completion(&self) {
        while !self.is_write_complete() {
            tokio::time::sleep(COMPLETION_POLL_INTERVAL).await;
        }
    }

    /// Drain logged write failures for the given hashes.
    ///
    /// Failures for other hashes stay in the log so concurrent callers only
    /// see their own.
    fn take_failures(&self, _hashes: &HashSet<ObjectHash>) -> Vec<WriteFailure> {
        Vec::new()
    }
}
