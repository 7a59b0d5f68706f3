use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tether_config::{DEFAULT_BIND_ADDRESS, DEFAULT_HASH_WORKERS, DEFAULT_UPLOAD_CONCURRENCY};
use tether_core::TrackingFolder;
use tracing::debug;

use crate::StorageError;

pub const CONFIG_FILENAME: &str = "config.json";

const QUALIFIER: &str = "com";
const ORG: &str = "tether";
const APP: &str = "tether";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConcurrencySettings {
    pub max_workers: usize,
    pub max_uploads: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_HASH_WORKERS,
            max_uploads: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    /// `host:port` or a full base URL of the peer.
    pub dest_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub folders: BTreeMap<String, TrackingFolder>,
    pub concurrency: ConcurrencySettings,
    pub client: ClientSettings,
    pub server: ServerSettings,
}

impl Configuration {
    pub fn folder(&self, name: &str) -> Option<&TrackingFolder> {
        self.folders.get(name)
    }
}

/// File identity used to detect edits made behind the store's back.
type FileStamp = Option<(SystemTime, u64)>;

struct Cached {
    stamp: FileStamp,
    config: Arc<Configuration>,
}

/// JSON configuration file with a read-through cache.
///
/// Reads are served from memory until the file's modification time or size changes.
/// Writes go through [`ConfigStore::update`] and replace the file atomically.
pub struct ConfigStore {
    path: Utf8PathBuf,
    cache: Mutex<Option<Cached>>,
}

impl ConfigStore {
    /// Platform configuration directory for this user.
    pub fn default_dir() -> Result<Utf8PathBuf, StorageError> {
        let proj_dirs = ProjectDirs::from(QUALIFIER, ORG, APP).ok_or(StorageError::Missing)?;
        Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf())
            .map_err(|p| StorageError::InvalidPath(p.to_string_lossy().into_owned()))
    }

    pub fn open(dir: &Utf8Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(CONFIG_FILENAME),
            cache: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Current configuration. A missing file yields the defaults.
    pub fn load(&self) -> Result<Arc<Configuration>, StorageError> {
        let mut slot = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        self.read_through(&mut slot)
    }

    /// Apply `f` to the current configuration and persist the result.
    ///
    /// Nothing is written if `f` fails. Concurrent updates from this process are serialized.
    pub fn update<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Configuration) -> Result<T, StorageError>,
    {
        let mut slot = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.read_through(&mut slot)?;
        let mut next = (*current).clone();
        let out = f(&mut next)?;

        let json = serde_json::to_vec_pretty(&next)?;
        atomic_write(&self.path, &json)?;
        *slot = Some(Cached {
            stamp: file_stamp(&self.path)?,
            config: Arc::new(next),
        });
        Ok(out)
    }

    fn read_through(&self, slot: &mut Option<Cached>) -> Result<Arc<Configuration>, StorageError> {
        let stamp = file_stamp(&self.path)?;
        if let Some(cached) = slot.as_ref() {
            if cached.stamp == stamp {
                return Ok(cached.config.clone());
            }
        }

        let config = match stamp {
            None => Configuration::default(),
            Some(_) => {
                debug!("Reading configuration from {}", self.path);
                let bytes = fs::read(&self.path)?;
                serde_json::from_slice(&bytes).map_err(|source| StorageError::CorruptConfig {
                    path: self.path.to_string(),
                    source,
                })?
            }
        };
        let config = Arc::new(config);
        *slot = Some(Cached {
            stamp,
            config: config.clone(),
        });
        Ok(config)
    }
}

fn file_stamp(path: &Utf8Path) -> Result<FileStamp, StorageError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some((meta.modified()?, meta.len()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn atomic_write(path: &Utf8Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    match fs::rename(&tmp_path, path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            fs::remove_file(path).ok();
            fs::rename(&tmp_path, path)?;
        }
        Err(e) => return Err(e),
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
