use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use cairn_canon::ContentHasher;
use cairn_protocol::endpoint::object_path;
use cairn_protocol::{endpoints, AuthMethod, BatchAck, ErrorBody, HealthResponse, ObjectBatch};
use cairn_transport::{Transport, TransportError, TransportResult, WriteFailure, WriteTracker};
use cairn_types::{ObjectHash, Record};

use crate::config::MirrorConfig;
use crate::error::{RemoteError, RemoteResult};

/// Connection details shared by the handle and its sender task.
struct Endpoint {
    name: String,
    base_url: String,
    client: Client,
    auth: AuthMethod,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.header_value() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Upload one chunk. Returns the number of objects the server accepted.
    async fn post(&self, records: &[Record]) -> Result<usize, String> {
        let batch = ObjectBatch::from_records(records).map_err(|e| e.to_string())?;
        let response = self
            .authorize(self.client.post(self.url(endpoints::OBJECTS)))
            .json(&batch)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(format!("HTTP {}: {message}", status.as_u16()));
        }
        let ack: BatchAck = response.json().await.map_err(|e| e.to_string())?;
        Ok(ack.accepted)
    }
}

/// Replicates records to a remote mirror server.
///
/// Records handed to [`persist_many`](Transport::persist_many) are queued on
/// an unbounded channel and uploaded by one background task in chunks of
/// `batch_size`. A failed upload records one [`WriteFailure`] per hash in the
/// chunk and moves on to the next chunk.
pub struct HttpMirror {
    endpoint: Arc<Endpoint>,
    sender: mpsc::UnboundedSender<Vec<Record>>,
    tracker: Arc<WriteTracker>,
}

impl HttpMirror {
    /// Build the client and spawn the sender task on the current runtime.
    pub fn new(config: MirrorConfig) -> RemoteResult<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RemoteError::NoRuntime)?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| RemoteError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder().timeout(config.timeout()).build()?;
        let endpoint = Arc::new(Endpoint {
            name: config.name.clone(),
            base_url,
            client,
            auth: AuthMethod::from_api_key(config.api_key.as_deref()),
        });
        let tracker = Arc::new(WriteTracker::new());
        let (sender, receiver) = mpsc::unbounded_channel();

        runtime.spawn(run_sender(
            Arc::clone(&endpoint),
            receiver,
            Arc::clone(&tracker),
            config.batch_size.max(1),
        ));

        debug!(mirror = %endpoint.name, url = %endpoint.base_url, "mirror transport ready");
        Ok(Self {
            endpoint,
            sender,
            tracker,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    /// Query the server's health endpoint.
    pub async fn health(&self) -> RemoteResult<HealthResponse> {
        let response = self
            .endpoint
            .client
            .get(self.endpoint.url(endpoints::HEALTH))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                name: self.endpoint.name.clone(),
                status: status.as_u16(),
                message: status.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Writes accepted but not yet uploaded or failed.
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    fn fetch_error(&self, hash: &ObjectHash, reason: impl Into<String>) -> TransportError {
        TransportError::Fetch {
            transport: self.endpoint.name.clone(),
            hash: *hash,
            reason: reason.into(),
        }
    }
}

async fn run_sender(
    endpoint: Arc<Endpoint>,
    mut receiver: mpsc::UnboundedReceiver<Vec<Record>>,
    tracker: Arc<WriteTracker>,
    batch_size: usize,
) {
    while let Some(records) = receiver.recv().await {
        for chunk in records.chunks(batch_size) {
            match endpoint.post(chunk).await {
                Ok(accepted) => {
                    debug!(mirror = %endpoint.name, count = chunk.len(), accepted, "chunk uploaded");
                }
                Err(reason) => {
                    warn!(
                        mirror = %endpoint.name,
                        count = chunk.len(),
                        error = %reason,
                        "chunk upload failed"
                    );
                    for record in chunk {
                        tracker.record_failure(WriteFailure {
                            transport: endpoint.name.clone(),
                            hash: record.hash,
                            reason: reason.clone(),
                        });
                    }
                }
            }
            tracker.finish(chunk.len());
        }
    }
    debug!(mirror = %endpoint.name, "mirror sender stopped");
}

#[async_trait]
impl Transport for HttpMirror {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn persist(&self, record: Record) -> TransportResult<()> {
        self.persist_many(vec![record]).await
    }

    async fn persist_many(&self, records: Vec<Record>) -> TransportResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        self.tracker.begin(count);
        if self.sender.send(records).is_err() {
            self.tracker.finish(count);
            return Err(TransportError::Closed {
                transport: self.endpoint.name.clone(),
            });
        }
        Ok(())
    }

    async fn fetch(&self, hash: &ObjectHash) -> TransportResult<Bytes> {
        let response = self
            .endpoint
            .authorize(self.endpoint.client.get(self.endpoint.url(&object_path(hash))))
            .send()
            .await
            .map_err(|e| self.fetch_error(hash, e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(TransportError::NotFound {
                transport: self.endpoint.name.clone(),
                hash: *hash,
            }),
            status if !status.is_success() => {
                Err(self.fetch_error(hash, format!("HTTP {}", status.as_u16())))
            }
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| self.fetch_error(hash, e.to_string()))?;
                if !ContentHasher::NODE.verify(&bytes, hash) {
                    return Err(TransportError::Corrupt {
                        transport: self.endpoint.name.clone(),
                        hash: *hash,
                        reason: "content does not match hash".into(),
                    });
                }
                Ok(bytes)
            }
        }
    }

    fn is_write_complete(&self) -> bool {
        self.tracker.is_idle()
    }

    async fn wait_for_completion(&self) {
        self.tracker.wait_idle().await;
    }

    fn take_failures(&self, hashes: &HashSet<ObjectHash>) -> Vec<WriteFailure> {
        self.tracker.take_failures(hashes)
    }
}

impl std::fmt::Debug for HttpMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMirror")
            .field("name", &self.endpoint.name)
            .field("base_url", &self.endpoint.base_url)
            .field("pending", &self.tracker.pending())
            .finish()
    }
}
