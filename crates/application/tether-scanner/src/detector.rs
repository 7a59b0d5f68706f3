use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tether_core::{FileRecord, FolderState};
use tether_infra::hashing::fingerprint_file;
use tether_persistence::{MetadataStore, StorageErrorKind};
use tracing::{debug, info, warn};

use crate::{ScannerError, Scanner};

/// Counters from one classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    /// Regular files found on disk.
    pub scanned: usize,
    /// Records carried forward because the modification time was unchanged.
    pub reused: usize,
    pub hashed: usize,
    /// Files that vanished or could not be read before they were hashed.
    pub skipped: usize,
    /// Previously recorded paths no longer on disk.
    pub removed: usize,
}

/// Brings the stored [`FolderState`] of a folder up to date with the disk.
///
/// Only new files and files whose modification time moved are hashed; hashing
/// runs on a dedicated pool so it never occupies async worker threads.
pub struct ChangeDetector {
    store: Arc<dyn MetadataStore>,
    pool: Arc<rayon::ThreadPool>,
    folder_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn MetadataStore>, workers: usize) -> Result<Self, ScannerError> {
        let workers = tether_config::clamp_hash_workers(workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tether-hash-{i}"))
            .build()
            .map_err(|e| ScannerError::Pool(e.to_string()))?;
        Ok(Self {
            store,
            pool: Arc::new(pool),
            folder_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub async fn classify(
        &self,
        folder_name: &str,
        base_path: &Utf8Path,
    ) -> Result<FolderState, ScannerError> {
        self.classify_detailed(folder_name, base_path)
            .await
            .map(|(state, _)| state)
    }

    /// Classify and commit, returning the new state and what it took to compute it.
    ///
    /// Runs for the same folder name are serialized; different folders proceed independently.
    pub async fn classify_detailed(
        &self,
        folder_name: &str,
        base_path: &Utf8Path,
    ) -> Result<(FolderState, ClassifyStats), ScannerError> {
        let lock = self.folder_lock(folder_name);
        let _guard = lock.lock().await;

        let store = self.store.clone();
        let pool = self.pool.clone();
        let name = folder_name.to_string();
        let base = base_path.to_path_buf();

        tokio::task::spawn_blocking(move || classify_blocking(store.as_ref(), &pool, &name, &base))
            .await
            .map_err(|e| ScannerError::Pool(e.to_string()))?
    }

    fn folder_lock(&self, folder_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.folder_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(folder_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

fn load_previous(
    store: &dyn MetadataStore,
    name: &str,
    base: &Utf8Path,
) -> Result<FolderState, ScannerError> {
    match store.load_folder(name) {
        Ok(Some(state)) if state.base_path == base.as_str() => Ok(state),
        Ok(Some(state)) => {
            info!(
                "Folder '{}' moved from {} to {}, discarding recorded state",
                name, state.base_path, base
            );
            Ok(FolderState::empty(name, base.as_str()))
        }
        Ok(None) => Ok(FolderState::empty(name, base.as_str())),
        Err(e) if e.kind() == StorageErrorKind::Corrupt => {
            warn!("Recorded state for '{}' is unusable, re-hashing everything: {}", name, e);
            Ok(FolderState::empty(name, base.as_str()))
        }
        Err(e) => Err(e.into()),
    }
}

fn classify_blocking(
    store: &dyn MetadataStore,
    pool: &rayon::ThreadPool,
    name: &str,
    base: &Utf8Path,
) -> Result<(FolderState, ClassifyStats), ScannerError> {
    let previous = load_previous(store, name, base)?;
    let disk = Scanner::scan_folder(base)?;

    let mut stats = ClassifyStats {
        scanned: disk.len(),
        ..ClassifyStats::default()
    };
    let mut next = FolderState::empty(name, base.as_str());
    let mut to_hash = Vec::new();

    for (rel_path, mtime) in &disk {
        match previous.get(rel_path) {
            Some(record) if record.is_hashed() && record.modified_time == *mtime => {
                next.insert(record.clone());
                stats.reused += 1;
            }
            _ => to_hash.push(rel_path.clone()),
        }
    }
    stats.removed = previous
        .files
        .keys()
        .filter(|p| !disk.contains_key(*p))
        .count();

    let (records, skipped) = fingerprint_all(pool, base, &to_hash);
    stats.hashed = records.len();
    stats.skipped = skipped;
    for record in records {
        next.insert(record);
    }

    store.commit_folder(&next)?;
    info!(
        "Classified '{}': {} files, {} hashed, {} reused, {} removed",
        name, stats.scanned, stats.hashed, stats.reused, stats.removed
    );
    Ok((next, stats))
}

/// Fingerprint `paths` on `pool`. Files that fail are left out and counted.
fn fingerprint_all(
    pool: &rayon::ThreadPool,
    base: &Utf8Path,
    paths: &[String],
) -> (Vec<FileRecord>, usize) {
    let results: Vec<Option<FileRecord>> = pool.install(|| {
        paths
            .par_iter()
            .map(|rel_path| {
                let abs: Utf8PathBuf = base.join(rel_path);
                match fingerprint_file(&abs) {
                    Ok(fp) => Some(FileRecord::new(
                        rel_path.clone(),
                        fp.modified_time,
                        fp.content_hash,
                    )),
                    Err(e) if e.is_vanished() => {
                        debug!("{} vanished before hashing", rel_path);
                        None
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", rel_path, e);
                        None
                    }
                }
            })
            .collect()
    });

    let skipped = results.iter().filter(|r| r.is_none()).count();
    (results.into_iter().flatten().collect(), skipped)
}
