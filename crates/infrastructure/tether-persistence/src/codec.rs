use tether_core::path_utils::TetherPath;
use tether_core::FolderState;

use crate::StorageError;

pub fn encode_folder_state(state: &FolderState) -> Result<Vec<u8>, StorageError> {
    if let Some(bad) = state.files.keys().find(|k| !TetherPath::verify_safe(k)) {
        return Err(StorageError::InvalidPath(bad.clone()));
    }
    Ok(serde_json::to_vec(state)?)
}

/// Undecodable or invalid records are corruption, not codec errors.
pub fn decode_folder_state(name: &str, bytes: &[u8]) -> Result<FolderState, StorageError> {
    serde_json::from_slice(bytes).map_err(|source| StorageError::CorruptRecord {
        name: name.to_string(),
        source,
    })
}
