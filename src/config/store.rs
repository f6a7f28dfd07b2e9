use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use super::AppConfig;
use crate::error::{AppError, Result};

/// Configuration store backed by a JSON file
///
/// Uses `ArcSwap` for lock-free reads.
#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    cache: Arc<ArcSwap<AppConfig>>,
    change_tx: broadcast::Sender<ConfigChange>,
}

/// Configuration change event
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub key: String,
}

impl ConfigStore {
    /// Open a configuration file, creating it with defaults when missing
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let config = match tokio::fs::read_to_string(path).await {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                AppError::Config(format!("Invalid config file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = AppConfig::default();
                Self::save_to_file(path, &config).await?;
                info!("Created default configuration at {}", path.display());
                config
            }
            Err(e) => return Err(e.into()),
        };

        let (change_tx, _) = broadcast::channel(16);

        Ok(Self {
            path: path.to_path_buf(),
            cache: Arc::new(ArcSwap::from_pointee(config)),
            change_tx,
        })
    }

    /// In-memory store (nothing is persisted)
    pub fn ephemeral(config: AppConfig) -> Self {
        let (change_tx, _) = broadcast::channel(16);
        Self {
            path: PathBuf::new(),
            cache: Arc::new(ArcSwap::from_pointee(config)),
            change_tx,
        }
    }

    /// Write atomically: temp file, then rename
    async fn save_to_file(path: &Path, config: &AppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn persist(&self, config: &AppConfig) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        Self::save_to_file(&self.path, config).await
    }

    /// Get current configuration (lock-free)
    pub fn get(&self) -> Arc<AppConfig> {
        self.cache.load_full()
    }

    /// Set entire configuration
    pub async fn set(&self, config: AppConfig) -> Result<()> {
        self.persist(&config).await?;
        self.cache.store(Arc::new(config));

        let _ = self.change_tx.send(ConfigChange {
            key: "app_config".to_string(),
        });

        Ok(())
    }

    /// Update configuration with a closure
    ///
    /// Read-modify-write; concurrent updates are last-write-wins.
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = (**self.cache.load()).clone();
        f(&mut config);
        self.set(config).await
    }

    /// Subscribe to configuration changes
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }

    /// Backing file (empty for ephemeral stores)
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webrtc::config::SignalingMode;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("camview.json");

        let store = ConfigStore::new(&path).await.unwrap();
        assert!(path.exists());

        let config = store.get();
        assert_eq!(config.signaling.mode, SignalingMode::Whep);

        let mut changes = store.subscribe();
        tokio_test::assert_ok!(
            store
                .update(|c| {
                    c.signaling.mode = SignalingMode::BackendOffer;
                    c.viewer.reconnect_delay_ms = 500;
                })
                .await
        );
        assert_eq!(changes.recv().await.unwrap().key, "app_config");

        let config = store.get();
        assert_eq!(config.signaling.mode, SignalingMode::BackendOffer);

        // New store instance sees the persisted values
        let store2 = ConfigStore::new(&path).await.unwrap();
        let config = store2.get();
        assert_eq!(config.signaling.mode, SignalingMode::BackendOffer);
        assert_eq!(config.viewer.reconnect_delay_ms, 500);
    }

    #[tokio::test]
    async fn test_set_replaces_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("camview.json");
        let store = ConfigStore::new(&path).await.unwrap();
        let mut changes = store.subscribe();

        let mut config = AppConfig::default();
        config.registry.base_url = "http://registry:9000".to_string();
        config.viewer.start_muted = false;
        tokio_test::assert_ok!(store.set(config).await);
        assert_eq!(changes.recv().await.unwrap().key, "app_config");

        let reloaded = ConfigStore::new(&path).await.unwrap().get();
        assert_eq!(reloaded.registry.base_url, "http://registry:9000");
        assert!(!reloaded.viewer.start_muted);
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = ConfigStore::new(&path).await.err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_ephemeral_store_does_not_persist() {
        let store = ConfigStore::ephemeral(AppConfig::default());
        store.update(|c| c.viewer.autoplay = false).await.unwrap();
        assert!(!store.get().viewer.autoplay);
        assert!(store.path().as_os_str().is_empty());
    }
}
