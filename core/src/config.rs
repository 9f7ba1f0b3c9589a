//! Engine configuration

use crate::types::AuthorId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
///
/// Missing fields fall back to [`Default`], so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory of the RocksDB operation log
    pub storage_path: PathBuf,
    /// Author id stamped on local operations. A fresh one is generated when unset.
    pub author_id: Option<AuthorId>,
    /// First retry delay of the uploader
    pub upload_backoff_initial_ms: u64,
    /// Retry delay ceiling of the uploader
    pub upload_backoff_max_ms: u64,
    /// Buffered batches between the transport and the remote feed
    pub remote_feed_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./tally-data"),
            author_id: None,
            upload_backoff_initial_ms: 200,
            upload_backoff_max_ms: 30_000,
            remote_feed_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.upload_backoff_initial_ms == 0 {
            return Err(Error::Config("upload_backoff_initial_ms must be > 0".to_string()));
        }
        if self.upload_backoff_initial_ms > self.upload_backoff_max_ms {
            return Err(Error::Config(format!(
                "upload_backoff_initial_ms ({}) exceeds upload_backoff_max_ms ({})",
                self.upload_backoff_initial_ms, self.upload_backoff_max_ms
            )));
        }
        if self.remote_feed_capacity == 0 {
            return Err(Error::Config("remote_feed_capacity must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn upload_backoff_initial(&self) -> Duration {
        Duration::from_millis(self.upload_backoff_initial_ms)
    }

    pub fn upload_backoff_max(&self) -> Duration {
        Duration::from_millis(self.upload_backoff_max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "remote_feed_capacity": 8, "author_id": "phone" }"#).unwrap();
        assert_eq!(config.remote_feed_capacity, 8);
        assert_eq!(config.author_id, Some(AuthorId::from("phone")));
        assert_eq!(config.upload_backoff_max_ms, 30_000);
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let config = EngineConfig {
            upload_backoff_initial_ms: 5_000,
            upload_backoff_max_ms: 100,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_feed_capacity() {
        let config = EngineConfig {
            remote_feed_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
