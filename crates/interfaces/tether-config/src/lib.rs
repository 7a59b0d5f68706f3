//! Central configuration constants for runtime limits and defaults.

/// Default number of hashing workers used by the change detector.
pub const DEFAULT_HASH_WORKERS: usize = 4;

/// Minimum allowed hashing workers.
pub const MIN_HASH_WORKERS: usize = 1;

/// Maximum allowed hashing workers.
pub const MAX_HASH_WORKERS: usize = 32;

/// Default number of uploads in flight across all folders.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 3;

/// Minimum allowed concurrent uploads.
pub const MIN_UPLOAD_CONCURRENCY: usize = 1;

/// Maximum allowed concurrent uploads.
pub const MAX_UPLOAD_CONCURRENCY: usize = 16;

/// Chunk size used when streaming a file through the content digest.
pub const FINGERPRINT_CHUNK_SIZE: usize = 4 * 1024;

/// Timeout for the state and delete calls to the peer, in seconds. Uploads have no
/// total limit, since a large file can legitimately take longer.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Timeout for establishing a connection to the peer, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default listen address of the peer server.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default interval between runs of the watch loop, in seconds.
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 60;

/// Clamp a hashing worker count into the allowed range.
pub fn clamp_hash_workers(v: usize) -> usize {
    v.clamp(MIN_HASH_WORKERS, MAX_HASH_WORKERS)
}

/// Clamp an upload concurrency value into the allowed range.
pub fn clamp_uploads(v: usize) -> usize {
    v.clamp(MIN_UPLOAD_CONCURRENCY, MAX_UPLOAD_CONCURRENCY)
}
