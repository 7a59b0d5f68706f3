use std::collections::BTreeSet;
use tether_core::plan::plan;
use tether_core::{FileRecord, FolderState};

// --- Helper Functions to build folder states easily ---

const HASH_A: &str = "60b725f10c9c85c70d97880dfe8191b3";
const HASH_B: &str = "3b5d5c3712955042212316173ccf37be";
const HASH_C: &str = "2cd6ee2c70b0bde53fbe6cac3c8b8bb1";

fn make_file(path: &str, mtime: f64, hash: &str) -> FileRecord {
    FileRecord::new(path, mtime, hash.to_string())
}

fn make_state(files: Vec<FileRecord>) -> FolderState {
    let mut state = FolderState::empty("docs", "/home/user/docs");
    for f in files {
        state.insert(f);
    }
    state
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// --- Tests ---

#[test]
fn first_sync_uploads_everything() {
    let local = make_state(vec![
        make_file("a.txt", 10.0, HASH_A),
        make_file("b.txt", 11.0, HASH_B),
    ]);
    let remote = make_state(vec![]);

    let p = plan(&local, &remote);

    assert_eq!(p.to_upload, set(&["a.txt", "b.txt"]));
    assert!(p.to_delete.is_empty());
}

#[test]
fn removed_local_file_is_deleted_remotely() {
    let local = make_state(vec![make_file("a.txt", 10.0, HASH_A)]);
    let remote = make_state(vec![
        make_file("a.txt", 10.0, HASH_A),
        make_file("b.txt", 11.0, HASH_B),
    ]);

    let p = plan(&local, &remote);

    assert!(p.to_upload.is_empty());
    assert_eq!(p.to_delete, set(&["b.txt"]));
}

#[test]
fn touched_file_with_same_content_is_not_uploaded() {
    let local = make_state(vec![make_file("a.txt", 99.0, HASH_A)]);
    let remote = make_state(vec![make_file("a.txt", 10.0, HASH_A)]);

    let p = plan(&local, &remote);

    assert!(p.is_noop(), "mtime alone must never trigger a transfer");
    assert_eq!(p.in_sync, set(&["a.txt"]));
}

#[test]
fn content_change_is_uploaded() {
    let local = make_state(vec![make_file("a.txt", 10.0, HASH_B)]);
    let remote = make_state(vec![make_file("a.txt", 10.0, HASH_A)]);

    let p = plan(&local, &remote);

    assert_eq!(p.to_upload, set(&["a.txt"]));
}

#[test]
fn sets_partition_the_union_of_paths() {
    let local = make_state(vec![
        make_file("same", 1.0, HASH_A),
        make_file("changed", 1.0, HASH_B),
        make_file("local_only", 1.0, HASH_C),
        make_file("nested/dir/file", 1.0, HASH_A),
    ]);
    let remote = make_state(vec![
        make_file("same", 5.0, HASH_A),
        make_file("changed", 1.0, HASH_C),
        make_file("remote_only", 1.0, HASH_A),
        make_file("nested/dir/file", 1.0, HASH_A),
    ]);

    let p = plan(&local, &remote);

    let union: BTreeSet<String> = local
        .files
        .keys()
        .chain(remote.files.keys())
        .cloned()
        .collect();

    let mut covered = BTreeSet::new();
    for bucket in [&p.to_upload, &p.to_delete, &p.in_sync] {
        for path in bucket {
            assert!(covered.insert(path.clone()), "{path} appears twice");
        }
    }
    assert_eq!(covered, union);

    assert_eq!(p.to_upload, set(&["changed", "local_only"]));
    assert_eq!(p.to_delete, set(&["remote_only"]));
    assert_eq!(p.in_sync, set(&["nested/dir/file", "same"]));
}

#[test]
fn planning_is_deterministic() {
    let local = make_state(vec![
        make_file("z", 1.0, HASH_A),
        make_file("m", 1.0, HASH_B),
        make_file("a", 1.0, HASH_C),
    ]);
    let remote = make_state(vec![make_file("q", 1.0, HASH_A)]);

    let first = plan(&local, &remote);
    for _ in 0..10 {
        assert_eq!(plan(&local, &remote), first);
    }
    let order: Vec<&String> = first.to_upload.iter().collect();
    assert_eq!(order, vec!["a", "m", "z"]);
}
