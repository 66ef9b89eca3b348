use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for the local store.
///
/// The database lives at `<root>/<application>/<scope>.db` unless `path`
/// names the file directly. `root` defaults to the platform data directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    pub root: Option<PathBuf>,
    pub application: String,
    pub scope: String,
    /// Explicit database file; overrides `root`, `application` and `scope`.
    pub path: Option<PathBuf>,
    /// Most records committed in one transaction.
    pub max_batch_size: usize,
    /// Quiet window the writer waits for before draining the queue.
    pub debounce_ms: u64,
    /// zstd level applied to stored payloads.
    pub compression_level: i32,
    pub busy_timeout_ms: u64,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            root: None,
            application: "Cairn".to_string(),
            scope: "Objects".to_string(),
            path: None,
            max_batch_size: 1000,
            debounce_ms: 100,
            compression_level: 3,
            busy_timeout_ms: 5000,
        }
    }
}

impl LocalStoreConfig {
    /// Config for a database at exactly `path`.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Resolve the database file location.
    pub fn resolved_path(&self) -> StoreResult<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let root = match &self.root {
            Some(root) => root.clone(),
            None => dirs::data_dir().ok_or(StoreError::NoDataDir)?,
        };
        Ok(root
            .join(&self.application)
            .join(format!("{}.db", self.scope)))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LocalStoreConfig::default();
        assert_eq!(config.application, "Cairn");
        assert_eq!(config.scope, "Objects");
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.debounce(), Duration::from_millis(100));
    }

    #[test]
    fn path_from_root_application_and_scope() {
        let config = LocalStoreConfig {
            root: Some(PathBuf::from("/data")),
            application: "Viewer".into(),
            scope: "Cache".into(),
            ..LocalStoreConfig::default()
        };
        assert_eq!(
            config.resolved_path().unwrap(),
            PathBuf::from("/data/Viewer/Cache.db")
        );
    }

    #[test]
    fn explicit_path_wins() {
        let config = LocalStoreConfig {
            root: Some(PathBuf::from("/ignored")),
            ..LocalStoreConfig::at("/tmp/objects.db")
        };
        assert_eq!(config.resolved_path().unwrap(), PathBuf::from("/tmp/objects.db"));
    }
}
