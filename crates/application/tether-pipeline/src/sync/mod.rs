use tether_core::ReconciliationPlan;
use tether_persistence::{Configuration, StorageError, StorageErrorKind};
use tether_scanner::{ClassifyStats, ScannerError};

pub mod engine;
pub mod execute;
pub mod remote;

pub use engine::DefaultSyncEngine;
pub use execute::{DefaultPlanExecutor, DeleteOutcome, PlanExecutor, TransferReport};
pub use remote::{HttpRemoteStateProvider, RemoteStateProvider};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub hash_workers: usize,
    pub max_uploads: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            hash_workers: tether_config::DEFAULT_HASH_WORKERS,
            max_uploads: tether_config::DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            hash_workers: tether_config::clamp_hash_workers(config.concurrency.max_workers),
            max_uploads: tether_config::clamp_uploads(config.concurrency.max_uploads),
        }
    }
}

/// Result of one folder run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub folder: String,
    pub plan: ReconciliationPlan,
    pub classify: ClassifyStats,
    pub transfer: TransferReport,
}

impl SyncReport {
    pub fn uploads_succeeded(&self) -> usize {
        self.transfer.succeeded()
    }

    pub fn uploads_failed(&self) -> usize {
        self.transfer.failed()
    }

    /// True when every upload succeeded and the delete batch did not fail.
    pub fn is_clean(&self) -> bool {
        self.transfer.failed() == 0 && !matches!(self.transfer.delete, DeleteOutcome::Failed { .. })
    }
}

/// High-level error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Metadata store error: {0}")]
    Store(String),
    #[error("Remote fetch error: {0}")]
    Remote(String),
    #[error("Local state error: {0}")]
    Local(String),
    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub(crate) fn from_storage(e: StorageError) -> Self {
        match e.kind() {
            StorageErrorKind::Conflict | StorageErrorKind::NotFound | StorageErrorKind::InvalidPath => {
                SyncError::Configuration(e.to_string())
            }
            _ => SyncError::Store(e.to_string()),
        }
    }

    pub(crate) fn from_scanner(e: ScannerError) -> Self {
        match e {
            ScannerError::RootMissing(path) => {
                SyncError::Configuration(format!("base path {path} is missing"))
            }
            ScannerError::Store(e) => SyncError::Store(e.to_string()),
            other => SyncError::Local(other.to_string()),
        }
    }
}
