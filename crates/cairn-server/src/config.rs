use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use cairn_protocol::MAX_BATCH_OBJECTS;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest batch accepted by `POST /v1/objects`.
    pub max_batch_objects: usize,
    /// Request body ceiling in bytes.
    pub max_body_bytes: usize,
    /// When set, object endpoints require `Authorization: Bearer <key>`.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            max_batch_objects: MAX_BATCH_OBJECTS,
            max_body_bytes: 64 * 1024 * 1024,
            api_key: None,
        }
    }
}
