pub mod hashing;
pub mod net;

// Re-exports for convenience
pub use hashing::{compute_file_md5, fingerprint_file, Fingerprint, FingerprintError};
pub use net::{default_http_client, NetError, PeerClient, UploadRequest, Uploader};
