pub struct TetherPath;

impl TetherPath {
    /// Standardize directory separators to forward slashes.
    /// This is the wire format for store keys and peer documents.
    pub fn normalize(path: &str) -> String {
        let normalized = path.replace('\\', "/");
        match normalized.strip_prefix("./") {
            Some(rest) => rest.to_string(),
            None => normalized,
        }
    }

    /// Reject paths that could escape a folder root on either side of a sync.
    pub fn verify_safe(rel_path: &str) -> bool {
        if rel_path.is_empty() || rel_path.starts_with('/') || rel_path.starts_with('\\') {
            return false;
        }
        if Self::has_drive_prefix(rel_path) {
            return false;
        }
        let p = std::path::Path::new(rel_path);
        !p.is_absolute()
            && !p
                .components()
                .any(|c| {
                    matches!(
                        c,
                        std::path::Component::ParentDir
                            | std::path::Component::RootDir
                            | std::path::Component::Prefix(_)
                    )
                })
            && !rel_path.split(['/', '\\']).any(|seg| seg == "..")
    }

    /// "C:", "C:/x" or "C:\\x", which are absolute on Windows peers. "x:notes.txt" is a
    /// plain file name.
    fn has_drive_prefix(rel_path: &str) -> bool {
        match rel_path.as_bytes() {
            [drive, b':'] => drive.is_ascii_alphabetic(),
            [drive, b':', sep, ..] => drive.is_ascii_alphabetic() && matches!(sep, b'/' | b'\\'),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TetherPath;

    #[test]
    fn normalize_converts_separators() {
        assert_eq!(TetherPath::normalize("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(TetherPath::normalize("./a/b"), "a/b");
    }

    #[test]
    fn verify_safe_rejects_escapes() {
        assert!(TetherPath::verify_safe("a/b.txt"));
        assert!(TetherPath::verify_safe("..hidden/file"));
        assert!(!TetherPath::verify_safe(""));
        assert!(!TetherPath::verify_safe("/etc/passwd"));
        assert!(!TetherPath::verify_safe("a/../../b"));
        assert!(!TetherPath::verify_safe("..\\b"));
        assert!(!TetherPath::verify_safe("C:\\Windows"));
        assert!(!TetherPath::verify_safe("d:/data"));
        assert!(!TetherPath::verify_safe("e:"));
    }

    #[cfg(unix)]
    #[test]
    fn colon_in_a_file_name_is_not_a_drive() {
        assert!(TetherPath::verify_safe("x:notes.txt"));
        assert!(TetherPath::verify_safe("sub/c:/file"));
        assert!(TetherPath::verify_safe("12:30 meeting.txt"));
    }
}
