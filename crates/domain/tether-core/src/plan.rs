use crate::{FolderState, ReconciliationPlan};
use std::collections::BTreeSet;

/// Compute what the peer needs so that it matches `local`.
///
/// Content is compared by hash only; modification times never influence the plan.
/// A record without a hash on either side is treated as differing.
pub fn plan(local: &FolderState, remote: &FolderState) -> ReconciliationPlan {
    let mut to_upload = BTreeSet::new();
    let mut to_delete = BTreeSet::new();
    let mut in_sync = BTreeSet::new();

    for (path, local_file) in &local.files {
        match remote.files.get(path) {
            Some(remote_file)
                if local_file.is_hashed()
                    && remote_file.is_hashed()
                    && local_file.content_hash.eq_ignore_ascii_case(&remote_file.content_hash) =>
            {
                in_sync.insert(path.clone());
            }
            _ => {
                to_upload.insert(path.clone());
            }
        }
    }

    // Remote-only paths no longer exist locally.
    for path in remote.files.keys() {
        if !local.files.contains_key(path) {
            to_delete.insert(path.clone());
        }
    }

    ReconciliationPlan {
        to_upload,
        to_delete,
        in_sync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileRecord;

    fn state(files: &[(&str, &str)]) -> FolderState {
        let mut s = FolderState::empty("f", "/f");
        for (path, hash) in files {
            s.insert(FileRecord::new(*path, 1.0, hash.to_string()));
        }
        s
    }

    #[test]
    fn unhashed_remote_record_is_reuploaded() {
        let local = state(&[("a", "0cc175b9c0f1b6a831c399e269772661")]);
        let remote = state(&[("a", "")]);
        let p = plan(&local, &remote);
        assert!(p.to_upload.contains("a"));
        assert!(p.in_sync.is_empty());
    }

    #[test]
    fn digest_case_is_ignored() {
        let local = state(&[("a", "0cc175b9c0f1b6a831c399e269772661")]);
        let remote = state(&[("a", "0CC175B9C0F1B6A831C399E269772661")]);
        assert!(plan(&local, &remote).is_noop());
    }
}
