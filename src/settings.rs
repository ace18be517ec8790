//! Persistent application settings.
//!
//! Settings are stored as JSON in the app data directory and survive restarts.
//! Every field has a default, so partial files are accepted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::ConflictPolicy;

/// Application settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Remote collection endpoint; read with `GET ?_limit=n`, written with `POST`.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    /// Number of remote items fetched per sync pass.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    /// Category assigned to quotes coming from the remote source.
    #[serde(default = "default_server_category")]
    pub server_category: String,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a notification stays visible.
    #[serde(default = "default_notification_timeout_ms")]
    pub notification_timeout_ms: u64,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_remote_url() -> String {
    "https://jsonplaceholder.typicode.com/posts".into()
}
fn default_fetch_limit() -> usize {
    5
}
fn default_server_category() -> String {
    "Server".into()
}
fn default_sync_interval_secs() -> u64 {
    15
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_notification_timeout_ms() -> u64 {
    4000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            fetch_limit: default_fetch_limit(),
            server_category: default_server_category(),
            sync_interval_secs: default_sync_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            notification_timeout_ms: default_notification_timeout_ms(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Returns defaults if file doesn't exist.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse settings file: {}, using defaults", e);
                Self::default()
            }),
            Err(_) => {
                tracing::info!("No settings file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save settings to a JSON file.
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.fetch_limit, 5);
        assert_eq!(settings.server_category, "Server");
        assert_eq!(settings.sync_interval(), Duration::from_secs(15));
        assert_eq!(settings.notification_timeout(), Duration::from_secs(4));
        assert_eq!(settings.conflict_policy, ConflictPolicy::ServerWins);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            sync_interval_secs: 60,
            conflict_policy: ConflictPolicy::LocalWins,
            ..Settings::default()
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.sync_interval_secs, 60);
        assert_eq!(loaded.conflict_policy, ConflictPolicy::LocalWins);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"fetch_limit": 3, "conflict_policy": "local_wins"}"#).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.fetch_limit, 3);
        assert_eq!(loaded.conflict_policy, ConflictPolicy::LocalWins);
        assert_eq!(loaded.server_category, "Server");
    }

    #[test]
    fn test_load_missing_file() {
        let settings = Settings::load(&PathBuf::from("/nonexistent/settings.json"));
        assert_eq!(settings.fetch_limit, 5);
    }
}
