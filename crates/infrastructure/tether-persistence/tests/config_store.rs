use camino::Utf8PathBuf;
use filetime::FileTime;
use std::sync::Arc;
use tether_core::TrackingFolder;
use tether_persistence::{ConfigStore, StorageError, StorageErrorKind};

fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    ConfigStore::open(&root).unwrap()
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let cfg = store.load().unwrap();
    assert!(cfg.folders.is_empty());
    assert_eq!(cfg.concurrency.max_workers, 4);
    assert_eq!(cfg.concurrency.max_uploads, 3);
    assert!(!store.path().exists());
}

#[test]
fn update_persists_and_cache_serves_repeat_reads() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store
        .update(|cfg| {
            let folder = TrackingFolder::new("docs", "/home/u/docs");
            cfg.folders.insert(folder.name.clone(), folder);
            Ok(())
        })
        .unwrap();

    let first = store.load().unwrap();
    let second = store.load().unwrap();
    assert!(Arc::ptr_eq(&first, &second), "unchanged file must be served from cache");
    assert!(first.folder("docs").is_some());

    let reopened = store_in(&dir);
    assert_eq!(*reopened.load().unwrap(), *first);
}

#[test]
fn external_edit_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store
        .update(|cfg| {
            cfg.client.dest_address = Some("10.0.0.1:8000".into());
            Ok(())
        })
        .unwrap();
    assert_eq!(
        store.load().unwrap().client.dest_address.as_deref(),
        Some("10.0.0.1:8000")
    );

    std::fs::write(
        store.path(),
        r#"{"client":{"dest_address":"192.168.1.20:9000"}}"#,
    )
    .unwrap();
    filetime::set_file_mtime(store.path(), FileTime::from_unix_time(2_000_000_000, 0)).unwrap();

    assert_eq!(
        store.load().unwrap().client.dest_address.as_deref(),
        Some("192.168.1.20:9000")
    );
}

#[test]
fn failed_update_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let err = store
        .update(|cfg| -> Result<(), StorageError> {
            cfg.client.dest_address = Some("ignored".into());
            Err(StorageError::UnknownFolder("nope".into()))
        })
        .unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::NotFound);
    assert!(!store.path().exists());
}

#[test]
fn unparsable_file_is_reported_not_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), b"{ folders: oops").unwrap();

    let err = store.load().unwrap_err();
    assert_eq!(err.kind(), StorageErrorKind::Corrupt);
    assert_eq!(std::fs::read(store.path()).unwrap(), b"{ folders: oops");
}
