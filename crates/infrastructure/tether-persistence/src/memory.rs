use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tether_core::FolderState;

use crate::codec::{decode_folder_state, encode_folder_state};
use crate::{MetadataStore, StorageError};

/// Process-local store with the same encoding rules as the redb store.
#[derive(Default)]
pub struct MemoryMetadataStore {
    folders: Mutex<BTreeMap<String, Vec<u8>>>,
    commits: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes for `name`, bypassing encoding. Used to simulate damaged records.
    pub fn insert_raw(&self, name: &str, bytes: Vec<u8>) {
        self.lock().insert(name.to_string(), bytes);
    }

    /// Number of successful commits since creation.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.folders.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load_folder(&self, name: &str) -> Result<Option<FolderState>, StorageError> {
        match self.lock().get(name) {
            Some(bytes) => decode_folder_state(name, bytes).map(Some),
            None => Ok(None),
        }
    }

    fn commit_folder(&self, state: &FolderState) -> Result<(), StorageError> {
        let bytes = encode_folder_state(state)?;
        self.lock().insert(state.name.clone(), bytes);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn forget_folder(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.lock().remove(name).is_some())
    }

    fn folder_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock().keys().cloned().collect())
    }
}
