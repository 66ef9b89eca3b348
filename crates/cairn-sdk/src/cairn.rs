use std::sync::Arc;

use tracing::info;

use cairn_remote::HttpMirror;
use cairn_sqlite::{LocalStore, ShutdownMode, ShutdownReport};
use cairn_transport::Transport;
use cairn_types::{Node, ObjectGraph, ObjectHash};

use crate::config::CairnConfig;
use crate::error::SdkResult;
use crate::outcome::SerializeOutcome;
use crate::progress::Progress;
use crate::serializer::Serializer;

/// A configured cairn instance: the local store as primary, one HTTP mirror
/// per configured mirror, and a serializer over both.
///
/// Must be opened inside a tokio runtime, since mirrors start their sender
/// tasks on it.
pub struct Cairn {
    config: CairnConfig,
    store: Arc<LocalStore>,
    serializer: Serializer,
}

impl Cairn {
    pub fn open(config: CairnConfig) -> SdkResult<Self> {
        let store = Arc::new(LocalStore::open(config.store.clone())?);

        let mut builder = Serializer::builder(store.clone())
            .batch_size(config.batch_size)
            .completion_timeout(config.completion_timeout());
        for mirror in &config.mirrors {
            builder = builder.mirror(Arc::new(HttpMirror::new(mirror.clone())?));
        }

        info!(
            store = %store.path().display(),
            mirrors = config.mirrors.len(),
            "cairn opened"
        );
        Ok(Self {
            config,
            store,
            serializer: builder.build(),
        })
    }

    pub fn config(&self) -> &CairnConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The store as a type-erased transport, for hosting it in a server.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.store.clone()
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub async fn serialize(
        &self,
        graph: &ObjectGraph,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<SerializeOutcome> {
        self.serializer.serialize(graph, progress).await
    }

    pub async fn serialize_node(
        &self,
        node: &Node,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<SerializeOutcome> {
        self.serializer.serialize_node(node, progress).await
    }

    pub async fn deserialize(
        &self,
        root: ObjectHash,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<ObjectGraph> {
        self.serializer.deserialize(root, progress).await
    }

    pub async fn deserialize_node(
        &self,
        root: ObjectHash,
        progress: Option<&dyn Progress>,
    ) -> SdkResult<Node> {
        self.serializer.deserialize_node(root, progress).await
    }

    /// Flush queued writes and stop the store's writer thread.
    ///
    /// Blocks until the writer exits.
    pub fn close(&self) -> ShutdownReport {
        self.store.shutdown(ShutdownMode::Flush)
    }
}
