use camino::Utf8Path;
use md5::Context;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::time::UNIX_EPOCH;
use tether_config::FINGERPRINT_CHUNK_SIZE;
use tether_core::Md5Digest;

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FingerprintError {
    fn io(path: &Utf8Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    /// The file disappeared between being listed and being read.
    pub fn is_vanished(&self) -> bool {
        match self {
            FingerprintError::Io { source, .. } => source.kind() == ErrorKind::NotFound,
        }
    }
}

/// Modification time and content digest of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub modified_time: f64,
    pub content_hash: Md5Digest,
}

/// Fractional seconds since the Unix epoch; pre-epoch or unsupported timestamps map to 0.
pub fn modified_time(meta: &fs::Metadata) -> f64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Fingerprint a single file.
///
/// The timestamp is taken before the content is read: a write racing the digest leaves a
/// record whose time is older than the file, which the next classification re-hashes.
pub fn fingerprint_file(path: &Utf8Path) -> Result<Fingerprint, FingerprintError> {
    let meta = fs::metadata(path).map_err(|e| FingerprintError::io(path, e))?;
    let modified_time = modified_time(&meta);
    let content_hash = compute_file_md5(path)?;
    Ok(Fingerprint {
        modified_time,
        content_hash,
    })
}

/// Lower-case hex MD5 of a file, streamed in fixed-size chunks.
pub fn compute_file_md5(path: &Utf8Path) -> Result<Md5Digest, FingerprintError> {
    let mut file = File::open(path).map_err(|e| FingerprintError::io(path, e))?;
    let mut hasher = Context::new();
    let mut buf = [0u8; FINGERPRINT_CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FingerprintError::io(path, e)),
        };
        hasher.consume(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
