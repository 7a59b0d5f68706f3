use tether_core::FolderState;

pub const TETHER_REDB_FILENAME: &str = "tether.redb";
pub const CURRENT_SCHEMA: u32 = 1;

/// Durable home of the last committed [`FolderState`] per tracked folder.
///
/// Implementations are shared across tasks behind an `Arc`; every call is a
/// self-contained transaction.
pub trait MetadataStore: Send + Sync {
    /// The committed state for `name`, or `None` if nothing was ever committed.
    fn load_folder(&self, name: &str) -> Result<Option<FolderState>, crate::StorageError>;

    /// Replace the committed state for `state.name`.
    fn commit_folder(&self, state: &FolderState) -> Result<(), crate::StorageError>;

    /// Drop the state for `name`. Returns whether anything was removed.
    fn forget_folder(&self, name: &str) -> Result<bool, crate::StorageError>;

    /// Names of all folders with a committed state, sorted.
    fn folder_names(&self) -> Result<Vec<String>, crate::StorageError>;
}
