//! Outstanding-write accounting shared by asynchronous transports.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::warn;

use cairn_types::ObjectHash;

/// A write that was accepted but could not be committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteFailure {
    pub transport: String,
    pub hash: ObjectHash,
    pub reason: String,
}

impl std::fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.transport, self.hash.short_hex(), self.reason)
    }
}

/// Default bound on the failure log.
pub const DEFAULT_FAILURE_CAPACITY: usize = 65_536;

/// Counts writes in flight and logs the ones that failed.
///
/// Failures nobody collects (writes made outside a serialization, or ones
/// that settle after it stopped waiting) would otherwise pile up, so the log
/// is bounded and evicts its oldest entries first.
///
/// The counter lives in a `watch` channel, so [`wait_idle`](Self::wait_idle)
/// wakes as soon as it reaches zero without polling. `begin` and `finish`
/// are cheap and may be called from any thread, including a plain
/// `std::thread` writer outside the runtime.
pub struct WriteTracker {
    pending: watch::Sender<usize>,
    failures: Mutex<VecDeque<WriteFailure>>,
    capacity: usize,
}

impl WriteTracker {
    pub fn new() -> Self {
        Self::with_failure_capacity(DEFAULT_FAILURE_CAPACITY)
    }

    /// A tracker whose failure log keeps at most `capacity` entries.
    pub fn with_failure_capacity(capacity: usize) -> Self {
        Self {
            pending: watch::Sender::new(0),
            failures: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Mark `n` writes as accepted.
    pub fn begin(&self, n: usize) {
        if n > 0 {
            self.pending.send_modify(|pending| *pending += n);
        }
    }

    /// Mark `n` writes as settled, committed or failed.
    pub fn finish(&self, n: usize) {
        if n > 0 {
            self.pending
                .send_modify(|pending| *pending = pending.saturating_sub(n));
        }
    }

    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Resolve once no writes are in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    pub fn record_failure(&self, failure: WriteFailure) {
        let mut failures = self.failures.lock();
        if failures.len() >= self.capacity {
            if let Some(evicted) = failures.pop_front() {
                warn!(failure = %evicted, "failure log full, dropping oldest entry");
            }
        }
        failures.push_back(failure);
    }

    /// Remove and return the logged failures whose hash is in `hashes`.
    pub fn take_failures(&self, hashes: &HashSet<ObjectHash>) -> Vec<WriteFailure> {
        let mut failures = self.failures.lock();
        let (taken, kept): (VecDeque<_>, VecDeque<_>) = failures
            .drain(..)
            .partition(|failure| hashes.contains(&failure.hash));
        *failures = kept;
        taken.into()
    }

    /// Number of failures still in the log.
    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }
}

impl Default for WriteTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn failure(tag: &[u8]) -> WriteFailure {
        WriteFailure {
            transport: "test".into(),
            hash: ObjectHash::from_bytes(tag),
            reason: "boom".into(),
        }
    }

    // -----------------------------------------------------------------------
    // Counter
    // -----------------------------------------------------------------------

    #[test]
    fn begin_and_finish_balance() {
        let tracker = WriteTracker::new();
        assert!(tracker.is_idle());
        tracker.begin(3);
        assert_eq!(tracker.pending(), 3);
        tracker.finish(2);
        assert!(!tracker.is_idle());
        tracker.finish(1);
        assert!(tracker.is_idle());
    }

    #[test]
    fn finish_never_underflows() {
        let tracker = WriteTracker::new();
        tracker.finish(5);
        assert_eq!(tracker.pending(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_idle() {
        let tracker = WriteTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.wait_idle())
            .await
            .expect("idle tracker should not block");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_idle_wakes_when_writes_settle() {
        let tracker = Arc::new(WriteTracker::new());
        tracker.begin(2);

        let worker = Arc::clone(&tracker);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            worker.finish(1);
            std::thread::sleep(Duration::from_millis(20));
            worker.finish(1);
        });

        tokio::time::timeout(Duration::from_secs(2), tracker.wait_idle())
            .await
            .expect("writer thread should settle both writes");
        assert!(tracker.is_idle());
    }

    #[tokio::test]
    async fn wait_idle_times_out_while_pending() {
        let tracker = WriteTracker::new();
        tracker.begin(1);
        let waited = tokio::time::timeout(Duration::from_millis(30), tracker.wait_idle()).await;
        assert!(waited.is_err());
    }

    // -----------------------------------------------------------------------
    // Failure log
    // -----------------------------------------------------------------------

    #[test]
    fn take_failures_filters_by_hash() {
        let tracker = WriteTracker::new();
        tracker.record_failure(failure(b"mine"));
        tracker.record_failure(failure(b"theirs"));

        let mine: HashSet<_> = [ObjectHash::from_bytes(b"mine")].into_iter().collect();
        let taken = tracker.take_failures(&mine);
        assert_eq!(taken, vec![failure(b"mine")]);
        assert_eq!(tracker.failure_count(), 1);

        // Draining is destructive.
        assert!(tracker.take_failures(&mine).is_empty());
    }

    #[test]
    fn failure_log_is_bounded() {
        let tracker = WriteTracker::with_failure_capacity(2);
        tracker.record_failure(failure(b"first"));
        tracker.record_failure(failure(b"second"));
        tracker.record_failure(failure(b"third"));
        assert_eq!(tracker.failure_count(), 2);

        let all: HashSet<_> = [&b"first"[..], b"second", b"third"]
            .into_iter()
            .map(ObjectHash::from_bytes)
            .collect();
        let kept = tracker.take_failures(&all);
        assert_eq!(kept, vec![failure(b"second"), failure(b"third")]);
    }

    #[test]
    fn default_capacity_holds_many_failures() {
        let tracker = WriteTracker::new();
        for i in 0..1000u32 {
            tracker.record_failure(failure(&i.to_le_bytes()));
        }
        assert_eq!(tracker.failure_count(), 1000);
    }

    #[test]
    fn failure_display_is_attributable() {
        let text = failure(b"x").to_string();
        assert!(text.starts_with("test: "));
        assert!(text.ends_with(": boom"));
    }
}
