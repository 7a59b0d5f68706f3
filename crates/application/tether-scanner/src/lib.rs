use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use tether_core::path_utils::TetherPath;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub mod detector;
pub use detector::{ChangeDetector, ClassifyStats};

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("folder root {0} does not exist or is not a directory")]
    RootMissing(Utf8PathBuf),
    #[error("metadata store error: {0}")]
    Store(#[from] tether_persistence::StorageError),
    #[error("hashing pool error: {0}")]
    Pool(String),
}

/// Relative path (forward slashes) to modification time, for every regular file under a root.
pub type DiskListing = BTreeMap<String, f64>;

pub struct Scanner;

impl Scanner {
    pub fn mtime(meta: &fs::Metadata) -> f64 {
        tether_infra::hashing::modified_time(meta)
    }

    /// Walk `root` without hashing anything.
    ///
    /// Symlinks are not followed and only regular files are listed. Entries that
    /// cannot be read, whose path is not UTF-8, or whose name cannot be sent to a
    /// peer are skipped with a warning.
    pub fn scan_folder(root: &Utf8Path) -> Result<DiskListing, ScannerError> {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(ScannerError::RootMissing(root.to_path_buf())),
        }

        let mut listing = DiskListing::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = match Utf8PathBuf::from_path_buf(entry.path().to_path_buf()) {
                Ok(p) => p,
                Err(p) => {
                    warn!("Skipping non-UTF-8 path {}", p.display());
                    continue;
                }
            };
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            // Outside Windows a backslash is part of the name, and normalizing it would
            // point at a file that does not exist.
            if !cfg!(windows) && rel.as_str().contains('\\') {
                warn!("Skipping {}: backslash in file name", path);
                continue;
            }
            let rel_path = TetherPath::normalize(rel.as_str());
            if !TetherPath::verify_safe(&rel_path) {
                warn!("Skipping {}: not usable as a relative path", path);
                continue;
            }

            match entry.metadata() {
                Ok(meta) => {
                    listing.insert(rel_path, Self::mtime(&meta));
                }
                Err(e) => warn!("Skipping {}: {}", path, e),
            }
        }

        debug!("Scanned {} files under {}", listing.len(), root);
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn lists_nested_files_with_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();
        fs::write(root.join("a/b/deep.txt"), b"2").unwrap();

        let listing = Scanner::scan_folder(&root).unwrap();
        let keys: Vec<&str> = listing.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a/b/deep.txt", "top.txt"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir).join("nope");
        assert!(matches!(
            Scanner::scan_folder(&root),
            Err(ScannerError::RootMissing(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/file.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("loop")).unwrap();
        std::os::unix::fs::symlink(root.join("real/file.txt"), root.join("link.txt")).unwrap();

        let listing = Scanner::scan_folder(&root).unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing.contains_key("real/file.txt"));
    }
}
