use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tether_core::TrackingFolder;
use tether_infra::net::normalize_peer_base;
use tether_persistence::{ConfigStore, MetadataStore, StorageError};
use tracing::info;

use crate::sync::SyncError;

/// Registration of tracked folders and the peer address on top of the configuration.
pub struct FolderRegistry {
    config: Arc<ConfigStore>,
    store: Arc<dyn MetadataStore>,
}

impl FolderRegistry {
    pub fn new(config: Arc<ConfigStore>, store: Arc<dyn MetadataStore>) -> Self {
        Self { config, store }
    }

    /// Track `base_path` under `name`. The path must be an existing directory;
    /// it is stored in absolute form.
    pub fn register(&self, name: &str, base_path: &Utf8Path) -> Result<TrackingFolder, SyncError> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(SyncError::Configuration(format!(
                "invalid folder name {name:?}"
            )));
        }
        if !base_path.is_dir() {
            return Err(SyncError::Configuration(format!(
                "{base_path} is not a directory"
            )));
        }
        let absolute = base_path
            .canonicalize_utf8()
            .map_err(|e| SyncError::Local(format!("cannot resolve {base_path}: {e}")))?;

        let folder = self
            .config
            .update(|cfg| {
                if cfg.folders.contains_key(name) {
                    return Err(StorageError::FolderExists(name.to_string()));
                }
                let folder = TrackingFolder::new(name, absolute.as_str());
                cfg.folders.insert(name.to_string(), folder.clone());
                Ok(folder)
            })
            .map_err(SyncError::from_storage)?;

        info!("Registered '{}' at {} ({})", folder.name, folder.base_path, folder.id);
        Ok(folder)
    }

    /// Stop tracking `name` and drop its recorded state. Files on disk are untouched.
    pub fn unregister(&self, name: &str) -> Result<TrackingFolder, SyncError> {
        let folder = self
            .config
            .update(|cfg| {
                cfg.folders
                    .remove(name)
                    .ok_or_else(|| StorageError::UnknownFolder(name.to_string()))
            })
            .map_err(SyncError::from_storage)?;
        self.store
            .forget_folder(name)
            .map_err(SyncError::from_storage)?;
        info!("Unregistered '{}'", name);
        Ok(folder)
    }

    pub fn list(&self) -> Result<Vec<TrackingFolder>, SyncError> {
        let cfg = self.config.load().map_err(SyncError::from_storage)?;
        Ok(cfg.folders.values().cloned().collect())
    }

    pub fn find(&self, name: &str) -> Result<Option<TrackingFolder>, SyncError> {
        let cfg = self.config.load().map_err(SyncError::from_storage)?;
        Ok(cfg.folder(name).cloned())
    }

    pub fn base_path(&self, name: &str) -> Result<Utf8PathBuf, SyncError> {
        self.find(name)?
            .map(|f| Utf8PathBuf::from(f.base_path))
            .ok_or_else(|| SyncError::Configuration(format!("folder '{name}' is not registered")))
    }

    pub fn set_peer_address(&self, address: &str) -> Result<(), SyncError> {
        normalize_peer_base(address).map_err(|e| SyncError::Configuration(e.to_string()))?;
        let address = address.trim().to_string();
        self.config
            .update(|cfg| {
                cfg.client.dest_address = Some(address.clone());
                Ok(())
            })
            .map_err(SyncError::from_storage)?;
        info!("Peer address set to {}", address);
        Ok(())
    }

    pub fn peer_address(&self) -> Result<Option<String>, SyncError> {
        let cfg = self.config.load().map_err(SyncError::from_storage)?;
        Ok(cfg.client.dest_address.clone())
    }
}
