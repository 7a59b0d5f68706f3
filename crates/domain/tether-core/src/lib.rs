use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub mod path_utils;
pub mod plan;

use path_utils::TetherPath;

pub type Md5Digest = String;

/// Last known fingerprint of one file inside a tracked folder.
///
/// The relative path is the key of [`FolderState::files`] on the wire, so it is
/// not serialized with the record; it is restored when the state is decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    #[serde(skip)]
    pub relative_path: String,
    #[serde(rename = "dateModified")]
    pub modified_time: f64,
    /// Empty until the file has been hashed.
    #[serde(rename = "md5", default)]
    pub content_hash: Md5Digest,
}

impl FileRecord {
    pub fn new(relative_path: impl Into<String>, modified_time: f64, content_hash: Md5Digest) -> Self {
        Self {
            relative_path: relative_path.into(),
            modified_time,
            content_hash,
        }
    }

    pub fn is_hashed(&self) -> bool {
        !self.content_hash.is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidFolderState {
    #[error("unsafe relative path {0:?}")]
    UnsafePath(String),
    #[error("duplicate path {0:?} after separator normalization")]
    DuplicatePath(String),
    #[error("invalid modification time {time} for {path:?}")]
    InvalidTime { path: String, time: f64 },
    #[error("invalid md5 digest {hash:?} for {path:?}")]
    InvalidHash { path: String, hash: String },
}

/// Per-folder mapping of relative path to fingerprint, on either side of a sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "FolderStateWire", into = "FolderStateWire")]
pub struct FolderState {
    pub name: String,
    pub base_path: String,
    pub files: BTreeMap<String, FileRecord>,
}

#[derive(Serialize, Deserialize)]
struct FolderStateWire {
    name: String,
    base_path: String,
    #[serde(default)]
    files: BTreeMap<String, FileRecord>,
}

impl TryFrom<FolderStateWire> for FolderState {
    type Error = InvalidFolderState;

    fn try_from(wire: FolderStateWire) -> Result<Self, Self::Error> {
        let mut files = BTreeMap::new();
        for (key, mut record) in wire.files {
            let path = TetherPath::normalize(&key);
            if !TetherPath::verify_safe(&path) {
                return Err(InvalidFolderState::UnsafePath(key));
            }
            if !record.modified_time.is_finite() || record.modified_time < 0.0 {
                return Err(InvalidFolderState::InvalidTime {
                    path,
                    time: record.modified_time,
                });
            }
            if !is_md5_hex(&record.content_hash) {
                return Err(InvalidFolderState::InvalidHash {
                    path,
                    hash: record.content_hash,
                });
            }
            record.relative_path = path.clone();
            if files.insert(path.clone(), record).is_some() {
                return Err(InvalidFolderState::DuplicatePath(path));
            }
        }

        Ok(FolderState {
            name: wire.name,
            base_path: wire.base_path,
            files,
        })
    }
}

impl From<FolderState> for FolderStateWire {
    fn from(state: FolderState) -> Self {
        Self {
            name: state.name,
            base_path: state.base_path,
            files: state.files,
        }
    }
}

fn is_md5_hex(hash: &str) -> bool {
    hash.is_empty() || (hash.len() == 32 && hash.bytes().all(|b| b.is_ascii_hexdigit()))
}

impl FolderState {
    pub fn empty(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            files: BTreeMap::new(),
        }
    }

    /// Insert or replace a record, keyed by its relative path.
    pub fn insert(&mut self, record: FileRecord) {
        self.files.insert(record.relative_path.clone(), record);
    }

    pub fn get(&self, rel_path: &str) -> Option<&FileRecord> {
        self.files.get(rel_path)
    }

    pub fn contains(&self, rel_path: &str) -> bool {
        self.files.contains_key(rel_path)
    }

    pub fn paths(&self) -> BTreeSet<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A local directory registered for synchronization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackingFolder {
    pub name: String,
    pub base_path: String,
    #[serde(rename = "uuid")]
    pub id: Uuid,
}

impl TrackingFolder {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            id: Uuid::new_v4(),
        }
    }
}

/// Uploads and remote deletions needed to make the peer match the local folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_upload: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
    /// Present on both sides with equal content.
    pub in_sync: BTreeSet<String>,
}

impl ReconciliationPlan {
    /// True when neither uploads nor deletions are required.
    pub fn is_noop(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferStatus {
    Success,
    /// The peer answered, but not with success; or the source could not be read.
    Failure,
    /// The peer could not be reached or the exchange broke off.
    TransportError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferOutcome {
    pub relative_path: String,
    pub status: TransferStatus,
    pub bytes: u64,
    pub message: Option<String>,
}

impl TransferOutcome {
    pub fn success(relative_path: impl Into<String>, bytes: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            status: TransferStatus::Success,
            bytes,
            message: None,
        }
    }

    pub fn failure(relative_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            status: TransferStatus::Failure,
            bytes: 0,
            message: Some(message.into()),
        }
    }

    pub fn transport_error(relative_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            status: TransferStatus::TransportError,
            bytes: 0,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Body of a batched deletion request sent to the peer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteRequest {
    pub files_to_delete: Vec<String>,
}
