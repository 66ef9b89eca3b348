use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use cairn_canon::{parse, ContentHasher};
use cairn_graph::{decompose, decompose_node, Assembler, Decomposition};
use cairn_transport::{Transport, TransportError, WriteFailure};
use cairn_types::{Node, ObjectGraph, ObjectHash, Record};

use crate::error::{SdkError, SdkResult};
use crate::outcome::{MirrorReport, MirrorStatus, SerializeOutcome};
use crate::progress::{report, units, Progress};

/// Default records per `persist_many` call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default bound on waiting for transports to finish writing.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Writes object graphs to a primary transport and any number of mirrors,
/// and reads them back from the primary.
///
/// The primary must succeed for a serialization to succeed. Mirrors are
/// best effort: their failures and timeouts come back in
/// [`SerializeOutcome::mirrors`].
pub struct Serializer {
    primary: Arc<dyn Transport>,
    mirrors: Vec<Arc<dyn Transport>>,
    batch_size: usize,
    completion_timeout: Duration,
}

/// Builder for [`Serializer`].
pub struct SerializerBuilder {
    primary: Arc<dyn Transport>,
    mirrors: Vec<Arc<dyn Transport>>,
    batch_size: usize,
    completion_timeout: Duration,
}

impl SerializerBuilder {
    /// Add a mirror transport.
    pub fn mirror(mut self, transport: Arc<dyn Transport>) -> Self {
        self.mirrors.push(transport);
        self
    }

    /// Records per `persist_many` call. Zero is treated as one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn build(self) -> Serializer {
        Serializer {
            primary: self.primary,
            mirrors: self.mirrors,
            batch_size: self.batch_size,
            completion_timeout: self.completion_timeout,
        }
    }
}

impl Serializer {
    pub fn builder(primary: Arc<dyn Transport>) -> SerializerBuilder {
        SerializerBuilder {
            primary,
            mirrors: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    /// A serializer with no mirrors and default settings.
    pub fn new(primary: Arc<dyn Transport>) -> Self {
        Self::builder(primary).build()
    }

    pub fn primary(&self) -> &Arc<dyn Transport> {
        &self.primary
    }

    pub fn mirrors(&self) -> &[Arc<dyn Transport>] {
        &self.mirrors
    }

    // ---- Writing ----

    /// Decompose `graph` from its root and write every record.
    ///
    /// Structural problems (cycles, dangling links) are reported before
    /// anything is written.
    pub async fn serialize(
        &self,
        graph: &ObjectGraph,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<SerializeOutcome> {
        let decomposition = decompose(graph)?;
        self.write(decomposition, progress).await
    }

    /// Serialize a tree of inline child nodes.
    pub async fn serialize_node(
        &self,
        node: &Node,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<SerializeOutcome> {
        let decomposition = decompose_node(node)?;
        self.write(decomposition, progress).await
    }

    async fn write(
        &self,
        decomposition: Decomposition,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<SerializeOutcome> {
        let hashes = decomposition.hashes();
        let bytes = decomposition.total_bytes();
        let Decomposition { root, records, .. } = decomposition;
        let count = records.len();
        report(progress, units::DECOMPOSED, count);

        // Records a mirror refused outright, per mirror.
        let mut rejected: Vec<Vec<WriteFailure>> = vec![Vec::new(); self.mirrors.len()];

        for chunk in records.chunks(self.batch_size) {
            self.primary.persist_many(chunk.to_vec()).await?;

            for (mirror, rejected) in self.mirrors.iter().zip(rejected.iter_mut()) {
                // Once a mirror refuses a chunk, the rest are marked failed without trying.
                if !rejected.is_empty() {
                    rejected.extend(refused(mirror.name(), chunk, "earlier chunk was refused"));
                    continue;
                }
                if let Err(e) = mirror.persist_many(chunk.to_vec()).await {
                    warn!(mirror = %mirror.name(), error = %e, "mirror refused records");
                    rejected.extend(refused(mirror.name(), chunk, &e.to_string()));
                }
            }
            report(progress, units::PERSISTED, chunk.len());
        }

        let deadline = Instant::now() + self.completion_timeout;

        if tokio::time::timeout_at(deadline, self.primary.wait_for_completion())
            .await
            .is_err()
        {
            return Err(SdkError::Timeout {
                transport: self.primary.name().to_string(),
                waited: self.completion_timeout,
            });
        }
        if let Some(failure) = self.primary.take_failures(&hashes).into_iter().next() {
            return Err(SdkError::Transport(TransportError::Persist {
                transport: failure.transport,
                hash: failure.hash,
                reason: failure.reason,
            }));
        }

        // Mirrors write in the background, so waiting on each against the
        // shared deadline bounds the whole phase by one timeout.
        let mut mirrors = Vec::with_capacity(self.mirrors.len());
        for (mirror, mut failures) in self.mirrors.iter().zip(rejected) {
            let completed = tokio::time::timeout_at(deadline, mirror.wait_for_completion())
                .await
                .is_ok();
            failures.extend(mirror.take_failures(&hashes));
            let status = if !failures.is_empty() {
                MirrorStatus::Failed(failures)
            } else if !completed {
                MirrorStatus::TimedOut
            } else {
                MirrorStatus::Complete
            };
            if status != MirrorStatus::Complete {
                warn!(mirror = %mirror.name(), status = status_name(&status), "mirror incomplete");
            }
            mirrors.push(MirrorReport {
                transport: mirror.name().to_string(),
                status,
            });
        }

        info!(root = %root, records = count, bytes, "graph serialized");
        Ok(SerializeOutcome {
            root,
            records: count,
            bytes,
            mirrors,
        })
    }

    // ---- Reading ----

    /// Rebuild the graph rooted at `root` from the primary transport.
    ///
    /// Records are fetched breadth-first, each distinct hash once, so shared
    /// records come back as one shared node.
    pub async fn deserialize(
        &self,
        root: ObjectHash,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<ObjectGraph> {
        let mut assembler = Assembler::new();
        let mut queue = VecDeque::from([root]);
        let mut seen = HashSet::from([root]);

        while let Some(hash) = queue.pop_front() {
            let node = self.fetch_node(&hash).await?;
            for child in Assembler::references(&node) {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
            assembler.insert(hash, node);
            report(progress, units::FETCHED, 1);
        }

        debug!(root = %root, records = assembler.len(), "graph fetched");
        Ok(assembler.finish(root)?)
    }

    /// Rebuild the graph rooted at `root` as a tree of inline nodes.
    pub async fn deserialize_node(
        &self,
        root: ObjectHash,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<Node> {
        Ok(self.deserialize(root, progress).await?.materialize()?)
    }

    async fn fetch_node(&self, hash: &ObjectHash) -> SdkResult<Node> {
        let bytes = self.primary.fetch(hash).await.map_err(|e| match e {
            TransportError::NotFound { hash, .. } => SdkError::NotFound { hash },
            other => SdkError::Transport(other),
        })?;
        if !ContentHasher::NODE.verify(&bytes, hash) {
            return Err(SdkError::Corrupt {
                hash: *hash,
                reason: "content does not match hash".into(),
            });
        }
        parse(&bytes).map_err(|e| SdkError::Corrupt {
            hash: *hash,
            reason: e.to_string(),
        })
    }
}

fn refused(transport: &str, chunk: &[Record], reason: &str) -> Vec<WriteFailure> {
    chunk
        .iter()
        .map(|record| WriteFailure {
            transport: transport.to_string(),
            hash: record.hash,
            reason: reason.to_string(),
        })
        .collect()
}

fn status_name(status: &MirrorStatus) -> &'static str {
    match status {
        MirrorStatus::Complete => "complete",
        MirrorStatus::Failed(_) => "failed",
        MirrorStatus::TimedOut => "timed-out",
    }
}

impl std::fmt::Debug for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("primary", &self.primary.name())
            .field(
                "mirrors",
                &self.mirrors.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("batch_size", &self.batch_size)
            .field("completion_timeout", &self.completion_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use cairn_graph::GraphError;
    use cairn_transport::{InMemoryTransport, TransportResult, WriteTracker};
    use cairn_types::{NodeId, Value};

    /// Accepts every write, then logs each one as failed.
    struct FlakyTransport {
        tracker: WriteTracker,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn persist(&self, record: Record) -> TransportResult<()> {
            self.persist_many(vec![record]).await
        }

        async fn persist_many(&self, records: Vec<Record>) -> TransportResult<()> {
            for record in &records {
                self.tracker.record_failure(WriteFailure {
                    transport: "flaky".into(),
                    hash: record.hash,
                    reason: "disk full".into(),
                });
            }
            Ok(())
        }

        async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes> {
            Err(TransportError::NotFound {
                transport: "flaky".into(),
                hash: *hash,
            })
        }

        fn is_write_complete(&self) -> bool {
            true
        }

        fn take_failures(&self, hashes: &HashSet<ObjectHash>) -> Vec<WriteFailure> {
            self.tracker.take_failures(hashes)
        }
    }

    /// Accepts writes but never finishes them.
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn persist(&self, _record: Record) -> TransportResult<()> {
            Ok(())
        }

        async fn persist_many(&self, _records: Vec<Record>) -> TransportResult<()> {
            Ok(())
        }

        async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes> {
            Err(TransportError::NotFound {
                transport: "stalled".into(),
                hash: *hash,
            })
        }

        fn is_write_complete(&self) -> bool {
            false
        }
    }

    /// Refuses every write synchronously.
    struct ClosedTransport;

    #[async_trait]
    impl Transport for ClosedTransport {
        fn name(&self) -> &str {
            "closed"
        }

        async fn persist(&self, _record: Record) -> TransportResult<()> {
            Err(TransportError::Closed {
                transport: "closed".into(),
            })
        }

        async fn persist_many(&self, _records: Vec<Record>) -> TransportResult<()> {
            Err(TransportError::Closed {
                transport: "closed".into(),
            })
        }

        async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes> {
            Err(TransportError::NotFound {
                transport: "closed".into(),
                hash: *hash,
            })
        }

        fn is_write_complete(&self) -> bool {
            true
        }
    }

    fn building() -> Node {
        Node::new()
            .with("name", "Tower A")
            .with(
                "levels",
                vec![
                    Value::from(Node::new().with("name", "L1").with("elevation", 0.0)),
                    Value::from(Node::new().with("name", "L2").with("elevation", 3.5)),
                ],
            )
            .with("site", Node::new().with("city", "Oslo"))
    }

    /// Root with two distinct children that share one grandchild.
    fn diamond() -> ObjectGraph {
        let mut graph = ObjectGraph::new();
        let root = graph.add(Node::new().with("kind", "root"));
        let left = graph.add(Node::new().with("side", "left"));
        let right = graph.add(Node::new().with("side", "right"));
        let shared = graph.add(Node::new().with("material", "steel"));
        graph.node_mut(left).unwrap().insert("material", shared);
        graph.node_mut(right).unwrap().insert("material", shared);
        graph.node_mut(root).unwrap().insert("left", left);
        graph.node_mut(root).unwrap().insert("right", right);
        graph
    }

    fn memory() -> Arc<InMemoryTransport> {
        Arc::new(InMemoryTransport::new())
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn serialize_then_deserialize_node() {
        let primary = memory();
        let serializer = Serializer::new(primary.clone());

        let outcome = serializer.serialize_node(&building(), None).await.unwrap();
        assert_eq!(outcome.records, 4);
        assert!(outcome.is_complete());
        assert_eq!(primary.len(), 4);

        let restored = serializer.deserialize_node(outcome.root, None).await.unwrap();
        assert_eq!(restored, building());
    }

    #[tokio::test]
    async fn shared_records_are_written_once_and_come_back_shared() {
        let primary = memory();
        let serializer = Serializer::new(primary.clone());

        let outcome = serializer.serialize(&diamond(), None).await.unwrap();
        assert_eq!(outcome.records, 4);
        assert_eq!(primary.len(), 4);

        let graph = serializer.deserialize(outcome.root, None).await.unwrap();
        assert_eq!(graph.len(), 4);
        let root = graph.root_node().unwrap();
        let link = |key: &str| match root.get(key) {
            Some(Value::Link(id)) => *id,
            other => panic!("expected link for {key}, got {other:?}"),
        };
        let left = graph.node(link("left")).unwrap();
        let right = graph.node(link("right")).unwrap();
        assert_eq!(left.get("material"), right.get("material"));
    }

    #[tokio::test]
    async fn identical_children_collapse() {
        let primary = memory();
        let serializer = Serializer::new(primary.clone());
        let child = Node::new()
            .with("kind", "bolt")
            .with("thread", Node::new().with("grade", "8.8"));
        let root = Node::new().with("a", child.clone()).with("b", child);

        let outcome = serializer.serialize_node(&root, None).await.unwrap();
        assert_eq!(outcome.records, 3);
        assert_eq!(primary.len(), 3);
    }

    #[tokio::test]
    async fn serializing_twice_is_idempotent() {
        let primary = memory();
        let serializer = Serializer::new(primary.clone());
        let first = serializer.serialize_node(&building(), None).await.unwrap();
        let second = serializer.serialize_node(&building(), None).await.unwrap();
        assert_eq!(first.root, second.root);
        assert_eq!(primary.len(), 4);
    }

    #[tokio::test]
    async fn small_batches_cover_every_record() {
        let primary = memory();
        let serializer = Serializer::builder(primary.clone()).batch_size(1).build();
        let outcome = serializer.serialize_node(&building(), None).await.unwrap();
        assert_eq!(primary.len(), outcome.records);
    }

    #[tokio::test]
    async fn inline_map_with_null_round_trips() {
        let serializer = Serializer::new(memory());
        let mut props = std::collections::BTreeMap::new();
        props.insert("unit".to_string(), Value::from("mm"));
        props.insert("note".to_string(), Value::Null);
        let node = Node::new()
            .with("name", "plate")
            .with("props", Value::Map(props))
            .with("child", Node::new().with("dims", vec![Value::Null, Value::from(4i64)]));

        let outcome = serializer.serialize_node(&node, None).await.unwrap();
        let restored = serializer.deserialize_node(outcome.root, None).await.unwrap();
        assert_eq!(restored, node);
    }

    #[tokio::test]
    async fn deep_chain_round_trips() {
        const DEPTH: i64 = 100_000;
        let primary = memory();
        let serializer = Serializer::new(primary.clone());
        let mut graph = ObjectGraph::new();
        let ids: Vec<_> = (0..DEPTH)
            .map(|depth| graph.add(Node::new().with("depth", depth)))
            .collect();
        for pair in ids.windows(2) {
            graph.node_mut(pair[0]).unwrap().insert("next", pair[1]);
        }

        let outcome = serializer.serialize(&graph, None).await.unwrap();
        assert_eq!(outcome.records, DEPTH as usize);
        assert_eq!(primary.len(), DEPTH as usize);

        let restored = serializer.deserialize(outcome.root, None).await.unwrap();
        assert_eq!(restored.len(), DEPTH as usize);
        let mut current = restored.root();
        let mut depth = 0;
        while let Some(id) = current {
            let node = restored.node(id).unwrap();
            assert_eq!(node.get("depth"), Some(&Value::Integer(depth)));
            current = match node.get("next") {
                Some(Value::Link(next)) => Some(*next),
                _ => None,
            };
            depth += 1;
        }
        assert_eq!(depth, DEPTH);

        // The inline form nests DEPTH levels; take it apart one level at a time.
        let mut current = Some(serializer.deserialize_node(outcome.root, None).await.unwrap());
        let mut levels = 0;
        while let Some(mut node) = current.take() {
            current = match node.remove("next") {
                Some(Value::Object(next)) => Some(next),
                _ => None,
            };
            levels += 1;
        }
        assert_eq!(levels, DEPTH);
    }

    #[tokio::test]
    async fn progress_is_reported_in_both_directions() {
        let seen = Mutex::new(Vec::new());
        let progress = |unit: &str, delta: usize| seen.lock().unwrap().push((unit.to_string(), delta));
        let serializer = Serializer::builder(memory()).batch_size(3).build();

        let outcome = serializer
            .serialize_node(&building(), Some(&progress))
            .await
            .unwrap();
        serializer
            .deserialize(outcome.root, Some(&progress))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let total = |unit: &str| -> usize {
            seen.iter().filter(|(u, _)| u == unit).map(|(_, d)| d).sum()
        };
        assert_eq!(seen[0], (units::DECOMPOSED.to_string(), 4));
        assert_eq!(total(units::PERSISTED), 4);
        assert_eq!(total(units::FETCHED), 4);
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cycle_aborts_before_any_write() {
        let primary = memory();
        let serializer = Serializer::new(primary.clone());
        let mut graph = ObjectGraph::new();
        let a = graph.add(Node::new().with("name", "a"));
        let b = graph.add(Node::new().with("back", a));
        graph.node_mut(a).unwrap().insert("next", b);

        let err = serializer.serialize(&graph, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Structural(GraphError::Cycle { .. })));
        assert!(primary.is_empty());
    }

    #[tokio::test]
    async fn dangling_link_is_structural() {
        let serializer = Serializer::new(memory());
        let graph = ObjectGraph::from_root(Node::new().with("ghost", NodeId::new(9)));
        let err = serializer.serialize(&graph, None).await.unwrap_err();
        assert!(matches!(
            err,
            SdkError::Structural(GraphError::UnknownNode(_))
        ));
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let serializer = Serializer::new(memory());
        let hash = ObjectHash::from_bytes(b"never stored");
        let err = serializer.deserialize(hash, None).await.unwrap_err();
        assert!(matches!(err, SdkError::NotFound { hash: h } if h == hash));
    }

    #[tokio::test]
    async fn missing_child_is_not_found() {
        let primary = memory();
        let missing = ObjectHash::from_bytes(b"lost child");
        let (hash, bytes) = ContentHasher::NODE
            .hash_node(&Node::new().with("child", missing))
            .unwrap();
        primary.persist(Record::new(hash, bytes)).await.unwrap();

        let serializer = Serializer::new(primary);
        let err = serializer.deserialize(hash, None).await.unwrap_err();
        assert!(matches!(err, SdkError::NotFound { hash: h } if h == missing));
    }

    #[tokio::test]
    async fn tampered_record_is_corrupt() {
        let primary = memory();
        let hash = ObjectHash::from_bytes(b"claimed");
        primary
            .persist(Record::new(hash, &br#"{"name":"x"}"#[..]))
            .await
            .unwrap();
        let serializer = Serializer::new(primary);
        let err = serializer.deserialize(hash, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn primary_write_failures_are_fatal() {
        let flaky = Arc::new(FlakyTransport {
            tracker: WriteTracker::new(),
        });
        let serializer = Serializer::new(flaky);
        let err = serializer.serialize_node(&building(), None).await.unwrap_err();
        assert!(matches!(
            err,
            SdkError::Transport(TransportError::Persist { ref transport, .. }) if transport == "flaky"
        ));
    }

    #[tokio::test]
    async fn primary_timeout_is_fatal() {
        let serializer = Serializer::builder(Arc::new(StalledTransport))
            .completion_timeout(Duration::from_millis(50))
            .build();
        let err = serializer.serialize_node(&building(), None).await.unwrap_err();
        assert!(matches!(
            err,
            SdkError::Timeout { ref transport, waited } if transport == "stalled" && waited == Duration::from_millis(50)
        ));
    }

    // -----------------------------------------------------------------------
    // Mirrors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn healthy_mirror_receives_every_record() {
        let primary = memory();
        let mirror = Arc::new(InMemoryTransport::with_name("replica"));
        let serializer = Serializer::builder(primary.clone())
            .mirror(mirror.clone())
            .build();

        let outcome = serializer.serialize(&diamond(), None).await.unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.mirrors.len(), 1);
        assert_eq!(outcome.mirrors[0].transport, "replica");
        assert_eq!(mirror.hashes(), primary.hashes());
    }

    #[tokio::test]
    async fn mirror_failures_give_partial_outcome() {
        let primary = memory();
        let serializer = Serializer::builder(primary.clone())
            .mirror(Arc::new(FlakyTransport {
                tracker: WriteTracker::new(),
            }))
            .mirror(Arc::new(InMemoryTransport::with_name("good")))
            .build();

        let outcome = serializer.serialize_node(&building(), None).await.unwrap();
        assert_eq!(primary.len(), 4);
        assert!(!outcome.is_complete());

        let flaky = &outcome.mirrors[0];
        assert_eq!(flaky.transport, "flaky");
        assert_eq!(flaky.failures().len(), 4);
        assert!(flaky.failures().iter().all(|f| f.reason == "disk full"));
        assert!(outcome.mirrors[1].is_complete());
    }

    #[tokio::test]
    async fn refusing_mirror_reports_every_record() {
        let serializer = Serializer::builder(memory())
            .mirror(Arc::new(ClosedTransport))
            .batch_size(1)
            .build();
        let outcome = serializer.serialize_node(&building(), None).await.unwrap();
        let report = &outcome.mirrors[0];
        assert_eq!(report.failures().len(), 4);
        let failed: HashSet<_> = report.failures().iter().map(|f| f.hash).collect();
        assert_eq!(failed.len(), 4);
    }

    #[tokio::test]
    async fn slow_mirror_times_out_without_failing() {
        let serializer = Serializer::builder(memory())
            .mirror(Arc::new(StalledTransport))
            .completion_timeout(Duration::from_millis(50))
            .build();
        let outcome = serializer.serialize_node(&building(), None).await.unwrap();
        assert_eq!(outcome.mirrors[0].status, MirrorStatus::TimedOut);
        assert!(!outcome.is_complete());
    }
}
