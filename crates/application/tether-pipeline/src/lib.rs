pub mod registry;
pub mod sync;
pub mod tracker;

// Re-export core engine components
pub use registry::FolderRegistry;
pub use sync::{
    DefaultSyncEngine, DeleteOutcome, SyncError, SyncOptions, SyncReport, TransferReport,
};
pub use tracker::{ProgressTracker, TransferSnapshot};

// Re-export scanner types often needed by consumers
pub use tether_scanner::ClassifyStats;
