//! The write-behind queue and its single writer thread.
//!
//! Producers append whole batches under a mutex and signal a condition
//! variable. The writer waits until no new batch has arrived for the
//! debounce window (or a full transaction's worth is queued), then commits
//! up to `max_batch_size` records per transaction, looping until the queue
//! is empty. A batch is never split across transactions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use cairn_transport::{WriteFailure, WriteTracker};
use cairn_types::Record;

use crate::schema;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QueueState {
    Open,
    /// No new writes; drain what is queued, then exit.
    Draining,
    /// No new writes; the queue has been dropped, exit now.
    Stopped,
}

pub(crate) struct Queue {
    pub batches: VecDeque<Vec<Record>>,
    /// Records across all queued batches.
    pub queued: usize,
    pub last_arrival: Instant,
    pub state: QueueState,
    /// A caller is blocked in `flush`; skip the debounce window.
    pub urgent: bool,
    /// The writer holds records it has taken off the queue.
    pub writing: bool,
}

/// State shared between producers and the writer thread.
pub(crate) struct Shared {
    pub name: String,
    pub conn: Arc<Mutex<Connection>>,
    pub queue: Mutex<Queue>,
    /// Wakes the writer: new work, flush request, or shutdown.
    pub work: Condvar,
    /// Wakes flushers after each commit.
    pub settled: Condvar,
    pub tracker: WriteTracker,
    pub max_batch_size: usize,
    pub debounce: Duration,
    pub compression_level: i32,
}

impl Shared {
    pub fn new(
        name: String,
        conn: Arc<Mutex<Connection>>,
        max_batch_size: usize,
        debounce: Duration,
        compression_level: i32,
    ) -> Self {
        Self {
            name,
            conn,
            queue: Mutex::new(Queue {
                batches: VecDeque::new(),
                queued: 0,
                last_arrival: Instant::now(),
                state: QueueState::Open,
                urgent: false,
                writing: false,
            }),
            work: Condvar::new(),
            settled: Condvar::new(),
            tracker: WriteTracker::new(),
            max_batch_size: max_batch_size.max(1),
            debounce,
            compression_level,
        }
    }

    /// Block until everything queued so far is committed or failed.
    pub fn wait_settled(&self) {
        let mut queue = self.queue.lock();
        queue.urgent = true;
        self.work.notify_one();
        while !(queue.batches.is_empty() && !queue.writing) {
            self.settled.wait(&mut queue);
        }
    }
}

/// Body of the writer thread.
pub(crate) fn run(shared: Arc<Shared>) {
    debug!(store = %shared.name, "writer started");
    while let Some(batches) = next_transaction(&shared) {
        commit(&shared, batches);
        let mut queue = shared.queue.lock();
        queue.writing = false;
        if queue.batches.is_empty() {
            queue.urgent = false;
        }
        shared.settled.notify_all();
    }
    shared.settled.notify_all();
    debug!(store = %shared.name, "writer stopped");
}

/// Wait for the next transaction's worth of batches, or `None` at shutdown.
fn next_transaction(shared: &Shared) -> Option<Vec<Vec<Record>>> {
    let mut queue = shared.queue.lock();
    loop {
        match queue.state {
            QueueState::Stopped => return None,
            QueueState::Draining if queue.batches.is_empty() => return None,
            QueueState::Open if queue.batches.is_empty() => {
                shared.work.wait(&mut queue);
                continue;
            }
            _ => {}
        }

        // Debounce: hold off while producers are still adding.
        if queue.state == QueueState::Open
            && !queue.urgent
            && queue.queued < shared.max_batch_size
        {
            let quiet_at = queue.last_arrival + shared.debounce;
            let now = Instant::now();
            if now < quiet_at {
                shared.work.wait_for(&mut queue, quiet_at - now);
                continue;
            }
        }

        let mut taken = Vec::new();
        let mut count = 0;
        while let Some(front) = queue.batches.front() {
            // Whole batches only; an oversized batch goes alone.
            if count > 0 && count + front.len() > shared.max_batch_size {
                break;
            }
            count += front.len();
            if let Some(batch) = queue.batches.pop_front() {
                taken.push(batch);
            }
        }
        queue.queued -= count;
        queue.writing = true;
        return Some(taken);
    }
}

fn commit(shared: &Shared, batches: Vec<Vec<Record>>) {
    let count: usize = batches.iter().map(Vec::len).sum();
    let started = Instant::now();
    let result = {
        let mut conn = shared.conn.lock();
        schema::insert_all(&mut conn, batches.iter().flatten(), shared.compression_level)
    };
    match result {
        Ok(added) => {
            debug!(
                store = %shared.name,
                count,
                added,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "batch committed"
            );
        }
        Err(e) => {
            warn!(store = %shared.name, count, error = %e, "batch commit failed");
            let reason = e.to_string();
            for record in batches.iter().flatten() {
                shared.tracker.record_failure(WriteFailure {
                    transport: shared.name.clone(),
                    hash: record.hash,
                    reason: reason.clone(),
                });
            }
        }
    }
    shared.tracker.finish(count);
}

/// Drop everything queued. Returns the number of records discarded.
pub(crate) fn discard(shared: &Shared, queue: &mut Queue) -> usize {
    let dropped = queue.queued;
    queue.batches.clear();
    queue.queued = 0;
    shared.tracker.finish(dropped);
    if dropped > 0 {
        info!(store = %shared.name, dropped, "queued records discarded");
    }
    dropped
}
