use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use tether_core::FolderState;
use tracing::debug;

use crate::api::{CURRENT_SCHEMA, TETHER_REDB_FILENAME};
use crate::codec::{decode_folder_state, encode_folder_state};
use crate::maintenance::quarantine_corrupt_file;
use crate::{MetadataStore, StorageError};

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const FOLDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("folders");

const META_FORMAT_KEY: &str = "format";
const META_FORMAT_VALUE: &str = "tether-redb";
const META_SCHEMA_VERSION: &str = "schema_version";
const META_CREATED_AT: &str = "created_at";
const META_LAST_COMMIT_AT: &str = "last_commit_at";

/// Metadata store backed by a single redb file.
///
/// Open it once per process and share the handle; redb refuses a second open of
/// the same file from the same process.
pub struct RedbMetadataStore {
    path: Utf8PathBuf,
    db: Database,
}

impl RedbMetadataStore {
    fn is_corrupt_open_error(err: &redb::DatabaseError) -> bool {
        match err {
            redb::DatabaseError::Storage(storage) => match storage {
                redb::StorageError::Corrupted(_) => true,
                redb::StorageError::Io(ioe) => matches!(
                    ioe.kind(),
                    std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
                ),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn path_for_dir(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(TETHER_REDB_FILENAME)
    }

    /// Open `tether.redb` inside `dir`, creating it if needed.
    ///
    /// A file that is not a valid store is quarantined next to the original and a
    /// fresh store is created in its place. A store written by a newer schema is
    /// an error and left untouched.
    pub fn open(dir: &Utf8Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path_for_dir(dir);

        let db = if path.exists() {
            match Database::open(path.as_std_path()) {
                Ok(db) => match Self::ensure_schema(&db) {
                    Ok(()) => db,
                    Err(StorageError::Corrupt) => {
                        drop(db);
                        quarantine_corrupt_file(&path)?;
                        Self::create_fresh(&path)?
                    }
                    Err(e) => return Err(e),
                },
                Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                    return Err(StorageError::DatabaseAlreadyOpen);
                }
                Err(e) if Self::is_corrupt_open_error(&e) => {
                    quarantine_corrupt_file(&path)?;
                    Self::create_fresh(&path)?
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            Self::create_fresh(&path)?
        };

        debug!("Opened metadata store at {}", path);
        Ok(Self { path, db })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn create_fresh(path: &Utf8Path) -> Result<Database, StorageError> {
        let db = Database::create(path.as_std_path())?;
        Self::ensure_schema(&db)?;
        Ok(db)
    }

    fn ensure_schema(db: &Database) -> Result<(), StorageError> {
        // Create tables and required meta keys on first open.
        let write_tx = db.begin_write()?;
        {
            let mut meta = write_tx.open_table(META)?;
            let format: Option<String> = meta.get(META_FORMAT_KEY)?.map(|g| g.value().to_string());
            if format.is_none() {
                let schema_version = CURRENT_SCHEMA.to_string();
                let created_at = Utc::now().to_rfc3339();
                meta.insert(META_FORMAT_KEY, META_FORMAT_VALUE)?;
                meta.insert(META_SCHEMA_VERSION, schema_version.as_str())?;
                meta.insert(META_CREATED_AT, created_at.as_str())?;
            } else if format.as_deref() != Some(META_FORMAT_VALUE) {
                return Err(StorageError::Corrupt);
            }
        }
        let _ = write_tx.open_table(FOLDERS)?;
        write_tx.commit()?;

        let read_tx = db.begin_read()?;
        let meta = read_tx.open_table(META)?;
        let schema_version = meta
            .get(META_SCHEMA_VERSION)?
            .and_then(|g| g.value().parse::<u32>().ok())
            .unwrap_or(0);
        if schema_version == 0 {
            return Err(StorageError::Corrupt);
        }
        if schema_version > CURRENT_SCHEMA {
            return Err(StorageError::NewerSchema {
                found: schema_version,
                supported: CURRENT_SCHEMA,
            });
        }
        if schema_version != CURRENT_SCHEMA {
            return Err(StorageError::Corrupt);
        }
        Ok(())
    }
}

impl MetadataStore for RedbMetadataStore {
    fn load_folder(&self, name: &str) -> Result<Option<FolderState>, StorageError> {
        let read_tx = self.db.begin_read()?;
        let folders = read_tx.open_table(FOLDERS)?;
        let Some(guard) = folders.get(name)? else {
            return Ok(None);
        };
        decode_folder_state(name, guard.value()).map(Some)
    }

    fn commit_folder(&self, state: &FolderState) -> Result<(), StorageError> {
        let bytes = encode_folder_state(state)?;
        let write_tx = self.db.begin_write()?;
        {
            let mut folders = write_tx.open_table(FOLDERS)?;
            folders.insert(state.name.as_str(), bytes.as_slice())?;
            let ts = Utc::now().to_rfc3339();
            let mut meta = write_tx.open_table(META)?;
            meta.insert(META_LAST_COMMIT_AT, ts.as_str())?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn forget_folder(&self, name: &str) -> Result<bool, StorageError> {
        let write_tx = self.db.begin_write()?;
        let removed = {
            let mut folders = write_tx.open_table(FOLDERS)?;
            let removed = folders.remove(name)?.is_some();
            removed
        };
        write_tx.commit()?;
        Ok(removed)
    }

    fn folder_names(&self) -> Result<Vec<String>, StorageError> {
        let read_tx = self.db.begin_read()?;
        let folders = read_tx.open_table(FOLDERS)?;
        let mut names = Vec::new();
        for row in folders.iter()? {
            let (k, _) = row?;
            names.push(k.value().to_string());
        }
        Ok(names)
    }
}
