use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cairn_remote::MirrorConfig;
use cairn_sqlite::LocalStoreConfig;

use crate::error::{SdkError, SdkResult};
use crate::serializer::{DEFAULT_BATCH_SIZE, DEFAULT_COMPLETION_TIMEOUT};

/// Top-level configuration, usually read from a TOML file.
///
/// ```toml
/// batch_size = 1000
/// completion_timeout_ms = 30000
///
/// [store]
/// path = "/var/lib/cairn/objects.db"
///
/// [[mirrors]]
/// name = "backup"
/// base_url = "https://mirror.example.com"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub store: LocalStoreConfig,
    pub mirrors: Vec<MirrorConfig>,
    /// Records per `persist_many` call.
    pub batch_size: usize,
    pub completion_timeout_ms: u64,
}

impl Default for CairnConfig {
    fn default() -> Self {
        Self {
            store: LocalStoreConfig::default(),
            mirrors: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            completion_timeout_ms: DEFAULT_COMPLETION_TIMEOUT.as_millis() as u64,
        }
    }
}

impl CairnConfig {
    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> SdkResult<Self> {
        toml::from_str(content).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}
