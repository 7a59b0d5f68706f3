use camino::Utf8PathBuf;
use std::fs;
use tempfile::tempdir;
use tether_infra::{compute_file_md5, fingerprint_file};

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).expect("utf8 temp path")
}

#[test]
fn known_digest_is_lowercase_hex() {
    let dir = tempdir().unwrap();
    let path = utf8(dir.path().join("hello.txt"));
    fs::write(&path, b"hello").unwrap();

    let digest = compute_file_md5(&path).unwrap();
    assert_eq!(digest, "5d41402abc4b2a76b9719d911017c592");
}

#[test]
fn empty_file_has_md5_of_nothing() {
    let dir = tempdir().unwrap();
    let path = utf8(dir.path().join("empty"));
    fs::write(&path, b"").unwrap();

    assert_eq!(
        compute_file_md5(&path).unwrap(),
        "d41d8cd98f00b204e9800998ecf8427e"
    );
}

#[test]
fn chunked_digest_matches_whole_buffer_digest() {
    let dir = tempdir().unwrap();
    let path = utf8(dir.path().join("big.bin"));
    // Several chunks plus a ragged tail.
    let data: Vec<u8> = (0..(3 * 4096 + 123)).map(|i| (i % 251) as u8).collect();
    fs::write(&path, &data).unwrap();

    let mut whole = md5::Context::new();
    whole.consume(&data);
    let expected = format!("{:x}", whole.finalize());

    assert_eq!(compute_file_md5(&path).unwrap(), expected);
}

#[test]
fn fingerprint_reports_mtime() {
    let dir = tempdir().unwrap();
    let path = utf8(dir.path().join("a.txt"));
    fs::write(&path, b"abc").unwrap();
    filetime_set(&path, 1_700_000_000);

    let fp = fingerprint_file(&path).unwrap();
    assert_eq!(fp.modified_time, 1_700_000_000.0);
    assert_eq!(fp.content_hash, "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn missing_file_is_reported_as_vanished() {
    let dir = tempdir().unwrap();
    let path = utf8(dir.path().join("gone.txt"));

    let err = fingerprint_file(&path).unwrap_err();
    assert!(err.is_vanished());
}

fn filetime_set(path: &Utf8PathBuf, secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
}
