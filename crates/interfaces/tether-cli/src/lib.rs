pub mod commands;
pub mod folders;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tether_persistence::{ConfigStore, RedbMetadataStore};
use tether_pipeline::{DefaultSyncEngine, FolderRegistry};

/// Everything a command needs: the configuration file, the metadata database and
/// the registry built over both.
pub struct Workspace {
    pub config: Arc<ConfigStore>,
    pub store: Arc<RedbMetadataStore>,
    pub registry: FolderRegistry,
}

impl Workspace {
    /// Open the workspace rooted at `config_dir`, or at the platform default.
    pub fn open(config_dir: Option<&Utf8Path>) -> anyhow::Result<Self> {
        let dir: Utf8PathBuf = match config_dir {
            Some(d) => d.to_path_buf(),
            None => ConfigStore::default_dir().context("No configuration directory available")?,
        };
        let config = Arc::new(
            ConfigStore::open(&dir).with_context(|| format!("Failed to open config in {dir}"))?,
        );
        let store = Arc::new(
            RedbMetadataStore::open(&dir)
                .with_context(|| format!("Failed to open metadata store in {dir}"))?,
        );
        let registry = FolderRegistry::new(config.clone(), store.clone());
        Ok(Self {
            config,
            store,
            registry,
        })
    }

    pub fn engine(&self) -> anyhow::Result<DefaultSyncEngine> {
        let client =
            tether_infra::net::default_http_client().context("Failed to build HTTP client")?;
        Ok(DefaultSyncEngine::new(
            self.config.clone(),
            self.store.clone(),
            client,
        )?)
    }
}
