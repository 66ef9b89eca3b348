use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use cairn_transport::{Transport, TransportResult, WriteFailure};
use cairn_types::{ObjectHash, Record};

use crate::config::LocalStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema;
use crate::writer::{self, QueueState, Shared};

/// Transport name reported by the local store.
pub const LOCAL_TRANSPORT_NAME: &str = "local";

/// How [`LocalStore::shutdown`] treats records still in the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Commit everything queued before stopping the writer.
    Flush,
    /// Drop queued records and stop immediately.
    Discard,
}

/// What happened to the queue during shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Records that were queued and handed to the writer to commit.
    pub flushed: usize,
    /// Records that were queued and dropped.
    pub discarded: usize,
}

/// Point-in-time store statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreStats {
    /// Committed records.
    pub records: u64,
    /// Compressed bytes on disk across committed records.
    pub stored_bytes: u64,
    /// Writes accepted but not yet settled.
    pub pending: usize,
}

/// Durable, content-addressed record store backed by one SQLite file.
///
/// Writes through [`persist`](Transport::persist) and
/// [`enqueue`](Self::enqueue) are queued and committed by a background
/// writer thread; [`persist_now`](Self::persist_now) and
/// [`persist_many_now`](Self::persist_many_now) commit on the caller's
/// thread. Reads only see committed records.
pub struct LocalStore {
    path: PathBuf,
    config: LocalStoreConfig,
    shared: Arc<Shared>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl LocalStore {
    /// Open (or create) the store and start its writer thread.
    pub fn open(config: LocalStoreConfig) -> StoreResult<Self> {
        let path = config.resolved_path()?;
        let conn = schema::open(&path, &config)?;
        let shared = Arc::new(Shared::new(
            LOCAL_TRANSPORT_NAME.to_string(),
            Arc::new(Mutex::new(conn)),
            config.max_batch_size,
            config.debounce(),
            config.compression_level,
        ));

        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("cairn-sqlite-writer".to_string())
            .spawn(move || writer::run(worker))?;

        info!(path = %path.display(), "local store opened");
        Ok(Self {
            path,
            config,
            shared,
            writer: Mutex::new(Some(handle)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &LocalStoreConfig {
        &self.config
    }

    /// Queue records for the writer as one batch.
    ///
    /// The batch commits in a single transaction.
    pub fn enqueue(&self, records: Vec<Record>) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        let mut queue = self.shared.queue.lock();
        if queue.state != QueueState::Open {
            return Err(StoreError::Closed);
        }
        self.shared.tracker.begin(count);
        queue.batches.push_back(records);
        queue.queued += count;
        queue.last_arrival = Instant::now();
        self.shared.work.notify_one();
        Ok(())
    }

    /// Commit one record immediately, bypassing the queue.
    pub fn persist_now(&self, record: &Record) -> StoreResult<()> {
        self.persist_many_now(std::slice::from_ref(record))
    }

    /// Commit records immediately in one transaction, bypassing the queue.
    pub fn persist_many_now(&self, records: &[Record]) -> StoreResult<()> {
        self.ensure_open()?;
        let mut conn = self.shared.conn.lock();
        let added = schema::insert_all(&mut conn, records, self.config.compression_level)?;
        debug!(count = records.len(), added, "records committed synchronously");
        Ok(())
    }

    /// Read and decompress the canonical bytes for `hash`.
    pub fn get(&self, hash: &ObjectHash) -> StoreResult<Bytes> {
        let conn = self.shared.conn.lock();
        schema::select(&conn, hash)?.ok_or(StoreError::NotFound(*hash))
    }

    /// Read several records; absent hashes come back as `None`.
    pub fn get_many(&self, hashes: &[ObjectHash]) -> StoreResult<Vec<Option<Bytes>>> {
        let conn = self.shared.conn.lock();
        hashes.iter().map(|hash| schema::select(&conn, hash)).collect()
    }

    pub fn contains(&self, hash: &ObjectHash) -> StoreResult<bool> {
        let conn = self.shared.conn.lock();
        schema::exists(&conn, hash)
    }

    /// Number of committed records.
    pub fn len(&self) -> StoreResult<u64> {
        Ok(self.stats()?.records)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let (records, stored_bytes) = {
            let conn = self.shared.conn.lock();
            schema::totals(&conn)?
        };
        Ok(StoreStats {
            records,
            stored_bytes,
            pending: self.shared.tracker.pending(),
        })
    }

    /// Block until every queued record has been committed or has failed.
    pub fn flush(&self) {
        self.shared.wait_settled();
    }

    /// Stop accepting writes and stop the writer thread.
    ///
    /// Calling it again is a no-op that returns an empty report.
    pub fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
        let Some(handle) = self.writer.lock().take() else {
            return ShutdownReport::default();
        };

        let report = {
            let mut queue = self.shared.queue.lock();
            let report = match mode {
                ShutdownMode::Flush => {
                    queue.state = QueueState::Draining;
                    ShutdownReport {
                        flushed: queue.queued,
                        discarded: 0,
                    }
                }
                ShutdownMode::Discard => {
                    queue.state = QueueState::Stopped;
                    ShutdownReport {
                        flushed: 0,
                        discarded: writer::discard(&self.shared, &mut queue),
                    }
                }
            };
            self.shared.work.notify_all();
            report
        };

        if handle.join().is_err() {
            error!(path = %self.path.display(), "writer thread panicked");
        }
        info!(
            path = %self.path.display(),
            flushed = report.flushed,
            discarded = report.discarded,
            "local store shut down"
        );
        report
    }

    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().state != QueueState::Open
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Drop for LocalStore {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Flush);
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("path", &self.path)
            .field("pending", &self.shared.tracker.pending())
            .finish()
    }
}

#[async_trait]
impl Transport for LocalStore {
    fn name(&self) -> &str {
        LOCAL_TRANSPORT_NAME
    }

    async fn persist(&self, record: Record) -> TransportResult<()> {
        self.persist_many(vec![record]).await
    }

    async fn persist_many(&self, records: Vec<Record>) -> TransportResult<()> {
        self.enqueue(records)
            .map_err(|e| e.into_transport(LOCAL_TRANSPORT_NAME, None))
    }

    async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes> {
        self.get(hash)
            .map_err(|e| e.into_transport(LOCAL_TRANSPORT_NAME, Some(*hash)))
    }

    fn is_write_complete(&self) -> bool {
        self.shared.tracker.is_idle()
    }

    async fn wait_for_completion(&self) {
        self.shared.tracker.wait_idle().await;
    }

    fn take_failures(&self, hashes: &HashSet<ObjectHash>) -> Vec<WriteFailure> {
        self.shared.tracker.take_failures(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cairn_canon::ContentHasher;
    use cairn_transport::TransportError;
    use cairn_types::Node;

    fn make_record(i: usize) -> Record {
        let node = Node::new().with("index", i as i64).with("kind", "element");
        let (hash, bytes) = ContentHasher::NODE.hash_node(&node).unwrap();
        Record::new(hash, bytes)
    }

    fn open_temp(tweak: impl FnOnce(&mut LocalStoreConfig)) -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LocalStoreConfig::at(dir.path().join("objects.db"));
        config.debounce_ms = 10;
        tweak(&mut config);
        let store = LocalStore::open(config).unwrap();
        (dir, store)
    }

    // -----------------------------------------------------------------------
    // Queued writes
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn persisted_records_become_fetchable() {
        let (_dir, store) = open_temp(|config| config.debounce_ms = 100);
        let records: Vec<_> = (0..10).map(make_record).collect();
        store.persist_many(records.clone()).await.unwrap();
        assert!(!store.is_write_complete());

        // One quiet window plus a single drain, with slack for a slow disk.
        let bound = store.config().debounce() + Duration::from_millis(400);
        tokio::time::timeout(bound, store.wait_for_completion())
            .await
            .expect("writer should drain within one debounce cycle");
        assert!(store.is_write_complete());

        for record in &records {
            assert_eq!(store.fetch(&record.hash).await.unwrap(), record.payload);
        }
        assert_eq!(store.len().unwrap(), 10);
    }

    #[test]
    fn queued_records_are_invisible_until_committed() {
        let (_dir, store) = open_temp(|config| config.debounce_ms = 60_000);
        let record = make_record(1);
        store.enqueue(vec![record.clone()]).unwrap();
        assert!(matches!(store.get(&record.hash), Err(StoreError::NotFound(_))));
        assert_eq!(store.stats().unwrap().pending, 1);

        // `flush` skips the quiet window.
        store.flush();
        assert!(store.get(&record.hash).is_ok());
        assert_eq!(store.stats().unwrap().pending, 0);
    }

    #[test]
    fn duplicate_writes_are_ignored() {
        let (_dir, store) = open_temp(|_| {});
        let record = make_record(7);
        store.enqueue(vec![record.clone(), record.clone()]).unwrap();
        store.enqueue(vec![record.clone()]).unwrap();
        store.flush();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn batches_larger_than_max_commit_whole() {
        let (_dir, store) = open_temp(|config| config.max_batch_size = 4);
        store.enqueue((0..10).map(make_record).collect()).unwrap();
        store.enqueue((10..13).map(make_record).collect()).unwrap();
        store.flush();
        assert_eq!(store.len().unwrap(), 13);
    }

    #[test]
    fn concurrent_producers() {
        let (_dir, store) = open_temp(|config| config.max_batch_size = 50);
        let store = Arc::new(store);
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for chunk in 0..5 {
                        let start = p * 100 + chunk * 20;
                        let records = (start..start + 20).map(make_record).collect();
                        store.enqueue(records).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        store.flush();

        let stats = store.stats().unwrap();
        assert_eq!(stats.records, 800);
        assert_eq!(stats.pending, 0);
    }

    // -----------------------------------------------------------------------
    // Synchronous writes and reads
    // -----------------------------------------------------------------------

    #[test]
    fn persist_now_is_immediately_visible() {
        let (_dir, store) = open_temp(|config| config.debounce_ms = 60_000);
        let record = make_record(3);
        store.persist_now(&record).unwrap();
        assert_eq!(store.get(&record.hash).unwrap(), record.payload);
        assert!(store.contains(&record.hash).unwrap());
    }

    #[test]
    fn persist_many_now_commits_together() {
        let (_dir, store) = open_temp(|_| {});
        let records: Vec<_> = (0..5).map(make_record).collect();
        store.persist_many_now(&records).unwrap();
        assert_eq!(store.len().unwrap(), 5);

        let mut hashes: Vec<_> = records.iter().map(|r| r.hash).collect();
        hashes.push(ObjectHash::from_bytes(b"missing"));
        let fetched = store.get_many(&hashes).unwrap();
        assert!(fetched[..5].iter().all(Option::is_some));
        assert!(fetched[5].is_none());
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let (_dir, store) = open_temp(|_| {});
        let hash = ObjectHash::from_bytes(b"absent");
        let err = store.fetch(&hash).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::NotFound {
                transport: LOCAL_TRANSPORT_NAME.into(),
                hash,
            }
        );
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocalStoreConfig::at(dir.path().join("objects.db"));
        let record = make_record(42);
        {
            let store = LocalStore::open(config.clone()).unwrap();
            store.enqueue(vec![record.clone()]).unwrap();
            // Drop flushes.
        }
        let store = LocalStore::open(config).unwrap();
        assert_eq!(store.get(&record.hash).unwrap(), record.payload);
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    #[test]
    fn shutdown_flush_commits_queue() {
        let (_dir, store) = open_temp(|config| config.debounce_ms = 60_000);
        store.enqueue((0..3).map(make_record).collect()).unwrap();
        let report = store.shutdown(ShutdownMode::Flush);
        assert_eq!(report, ShutdownReport { flushed: 3, discarded: 0 });
        assert_eq!(store.len().unwrap(), 3);
        assert!(store.is_write_complete());
    }

    #[test]
    fn shutdown_discard_drops_queue() {
        let (_dir, store) = open_temp(|config| config.debounce_ms = 60_000);
        store.enqueue((0..3).map(make_record).collect()).unwrap();
        let report = store.shutdown(ShutdownMode::Discard);
        assert_eq!(report, ShutdownReport { flushed: 0, discarded: 3 });
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.is_write_complete());
    }

    #[tokio::test]
    async fn writes_after_shutdown_are_rejected() {
        let (_dir, store) = open_temp(|_| {});
        store.shutdown(ShutdownMode::Flush);
        assert!(matches!(store.enqueue(vec![make_record(1)]), Err(StoreError::Closed)));
        assert!(matches!(store.persist_now(&make_record(1)), Err(StoreError::Closed)));
        assert_eq!(
            store.persist(make_record(1)).await.unwrap_err(),
            TransportError::Closed {
                transport: LOCAL_TRANSPORT_NAME.into()
            }
        );
        // Second shutdown is a no-op.
        assert_eq!(store.shutdown(ShutdownMode::Flush), ShutdownReport::default());
    }
}
