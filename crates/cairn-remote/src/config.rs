use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One remote mirror.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Name used in logs and failure reports.
    pub name: String,
    /// Server root, e.g. `https://mirror.example.com`.
    pub base_url: String,
    /// Sent as a bearer token when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Records per upload request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    500
}

impl MirrorConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
