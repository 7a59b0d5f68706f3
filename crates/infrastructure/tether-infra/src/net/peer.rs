use camino::Utf8Path;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode, Url};
use std::time::Duration;
use tether_config::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use tether_core::path_utils::TetherPath;
use tether_core::{DeleteRequest, FolderState, TransferOutcome};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("invalid peer address {address:?}: {reason}")]
    InvalidUrl { address: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("invalid folder state from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl NetError {
    /// The peer was reached and reported that the folder does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Shared HTTP client. Only connecting is bounded here; [`PeerClient`] puts a total
/// limit on the small requests and leaves uploads unbounded.
pub fn default_http_client() -> Result<Client, NetError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
        .map_err(NetError::Client)
}

/// Turn a configured destination ("host:port" or a full URL) into a base URL ending in '/'.
pub fn normalize_peer_base(address: &str) -> Result<Url, NetError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(NetError::InvalidUrl {
            address: address.to_string(),
            reason: "address is empty".into(),
        });
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let mut url = Url::parse(&candidate).map_err(|e| NetError::InvalidUrl {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(NetError::InvalidUrl {
            address: address.to_string(),
            reason: "not a base url".into(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Client for one peer's folder endpoints.
#[derive(Clone)]
pub struct PeerClient {
    client: Client,
    base: Url,
    request_timeout: Duration,
}

impl PeerClient {
    pub fn new(client: Client, address: &str) -> Result<Self, NetError> {
        Ok(Self {
            client,
            base: normalize_peer_base(address)?,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }

    /// Override the total limit on state and delete requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `{base}files/{folder}[/{action}]`, with the folder name percent-encoded as one segment.
    pub fn folder_url(&self, folder: &str, action: Option<&str>) -> Result<Url, NetError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| NetError::InvalidUrl {
                address: self.base.to_string(),
                reason: "not a base url".into(),
            })?;
            segments.pop_if_empty().push("files").push(folder);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    /// Fetch the peer's recorded state for `folder`.
    pub async fn folder_state(&self, folder: &str) -> Result<FolderState, NetError> {
        let url = self.folder_url(folder, None)?;
        debug!("Fetching remote state from {}", url);
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| NetError::Request {
                url: url.to_string(),
                source: e,
            })?;
        if !resp.status().is_success() {
            return Err(NetError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        let bytes = resp.bytes().await.map_err(|e| NetError::Request {
            url: url.to_string(),
            source: e,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| NetError::Decode {
            url: url.to_string(),
            source: e,
        })
    }

    /// Upload one file as a multipart form. Never fails; the result is the outcome.
    ///
    /// The body is streamed from disk, and the handle is released once the request ends.
    pub async fn upload_file(
        &self,
        folder: &str,
        relative_path: &str,
        source: &Utf8Path,
    ) -> TransferOutcome {
        if !TetherPath::verify_safe(relative_path) {
            return TransferOutcome::failure(relative_path, "unsafe relative path");
        }
        let url = match self.folder_url(folder, Some("upload")) {
            Ok(u) => u,
            Err(e) => return TransferOutcome::failure(relative_path, e.to_string()),
        };

        let file = match tokio::fs::File::open(source.as_std_path()).await {
            Ok(f) => f,
            Err(e) => {
                return TransferOutcome::failure(relative_path, format!("cannot open {source}: {e}"))
            }
        };
        let len = match file.metadata().await {
            Ok(m) => m.len(),
            Err(e) => {
                return TransferOutcome::failure(relative_path, format!("cannot stat {source}: {e}"))
            }
        };

        let part = match Part::stream_with_length(Body::from(file), len)
            .file_name(relative_path.to_string())
            .mime_str("application/octet-stream")
        {
            Ok(p) => p,
            Err(e) => return TransferOutcome::failure(relative_path, e.to_string()),
        };
        let form = Form::new().part("file", part);

        match self.client.post(url).multipart(form).send().await {
            Ok(resp) if resp.status().is_success() => TransferOutcome::success(relative_path, len),
            Ok(resp) => {
                TransferOutcome::failure(relative_path, format!("peer answered {}", resp.status()))
            }
            Err(e) => TransferOutcome::transport_error(relative_path, e.to_string()),
        }
    }

    /// Ask the peer to remove `paths` from `folder` in one request.
    pub async fn delete_files(&self, folder: &str, paths: Vec<String>) -> Result<(), NetError> {
        let url = self.folder_url(folder, Some("delete"))?;
        let body = DeleteRequest {
            files_to_delete: paths,
        };
        let resp = self
            .client
            .post(url.clone())
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| NetError::Request {
                url: url.to_string(),
                source: e,
            })?;
        if !resp.status().is_success() {
            return Err(NetError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_http_scheme() {
        let base = normalize_peer_base("10.0.0.5:8000").unwrap();
        assert_eq!(base.as_str(), "http://10.0.0.5:8000/");
    }

    #[test]
    fn folder_urls_keep_prefix_and_encode_name() {
        let peer = PeerClient::new(Client::new(), "https://sync.example.com/api").unwrap();
        assert_eq!(
            peer.folder_url("my docs", Some("upload")).unwrap().as_str(),
            "https://sync.example.com/api/files/my%20docs/upload"
        );
        assert_eq!(
            peer.folder_url("docs", None).unwrap().as_str(),
            "https://sync.example.com/api/files/docs"
        );
    }

    #[test]
    fn empty_address_is_rejected() {
        assert!(matches!(
            normalize_peer_base("  "),
            Err(NetError::InvalidUrl { .. })
        ));
    }
}
