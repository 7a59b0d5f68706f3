use crate::sync::SyncError;
use reqwest::Client;
use tether_core::FolderState;
use tether_infra::net::{NetError, PeerClient};

#[async_trait::async_trait]
pub trait RemoteStateProvider: Send + Sync {
    /// The peer's current state for `folder_name`.
    async fn fetch_folder_state(
        &self,
        peer_address: &str,
        folder_name: &str,
    ) -> Result<FolderState, SyncError>;
}

/// HTTP-based remote provider that asks the peer server for a folder's state.
pub struct HttpRemoteStateProvider {
    client: Client,
}

impl HttpRemoteStateProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

pub(crate) fn net_error(e: NetError) -> SyncError {
    match e {
        NetError::InvalidUrl { .. } => SyncError::Configuration(e.to_string()),
        other => SyncError::Remote(other.to_string()),
    }
}

#[async_trait::async_trait]
impl RemoteStateProvider for HttpRemoteStateProvider {
    async fn fetch_folder_state(
        &self,
        peer_address: &str,
        folder_name: &str,
    ) -> Result<FolderState, SyncError> {
        let peer = PeerClient::new(self.client.clone(), peer_address).map_err(net_error)?;
        let state = peer.folder_state(folder_name).await.map_err(|e| {
            if e.is_not_found() {
                SyncError::Remote(format!("peer does not serve folder '{folder_name}'"))
            } else {
                net_error(e)
            }
        })?;
        if state.name != folder_name {
            return Err(SyncError::Remote(format!(
                "peer answered for folder '{}' instead of '{}'",
                state.name, folder_name
            )));
        }
        Ok(state)
    }
}
