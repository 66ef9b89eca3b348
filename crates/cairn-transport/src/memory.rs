use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use cairn_types::{ObjectHash, Record};

use crate::error::{TransportError, TransportResult};
use crate::traits::Transport;

/// In-memory, HashMap-based transport.
///
/// Intended for tests and embedding. Writes are synchronous, so the
/// transport is always complete and never logs failures. Payloads are
/// reference-counted `Bytes`, so storing and fetching do not copy.
pub struct InMemoryTransport {
    name: String,
    records: RwLock<HashMap<ObjectHash, Bytes>>,
}

impl InMemoryTransport {
    /// Create a new empty transport named `"memory"`.
    pub fn new() -> Self {
        Self::with_name("memory")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Total payload bytes across all stored records.
    pub fn total_bytes(&self) -> u64 {
        self.records
            .read()
            .values()
            .map(|payload| payload.len() as u64)
            .sum()
    }

    pub fn contains(&self, hash: &ObjectHash) -> bool {
        self.records.read().contains_key(hash)
    }

    /// All stored hashes, sorted.
    pub fn hashes(&self) -> Vec<ObjectHash> {
        let mut hashes: Vec<_> = self.records.read().keys().copied().collect();
        hashes.sort();
        hashes
    }

    fn insert(&self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut map = self.records.write();
        let mut added = 0;
        for record in records {
            // First write wins; the same hash always carries the same bytes.
            map.entry(record.hash).or_insert_with(|| {
                added += 1;
                record.payload
            });
        }
        added
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn persist(&self, record: Record) -> TransportResult<()> {
        self.insert([record]);
        Ok(())
    }

    async fn persist_many(&self, records: Vec<Record>) -> TransportResult<()> {
        let offered = records.len();
        let added = self.insert(records);
        debug!(transport = %self.name, offered, added, "records stored");
        Ok(())
    }

    async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes> {
        self.records
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                transport: self.name.clone(),
                hash: *hash,
            })
    }

    fn is_write_complete(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("name", &self.name)
            .field("record_count", &self.len())
            .finish()
    }
}
