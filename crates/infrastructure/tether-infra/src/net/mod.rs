mod peer;

pub use peer::{default_http_client, normalize_peer_base, NetError, PeerClient};

use camino::Utf8PathBuf;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tether_core::TransferOutcome;
use tokio::sync::mpsc::Sender;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub relative_path: String,
    pub source_path: Utf8PathBuf,
}

/// Runs upload batches under a bound on transfers in flight.
///
/// Cloning shares the bound: every clone draws from the same pool of slots, so
/// concurrent batches for different folders together never exceed it.
#[derive(Clone)]
pub struct Uploader {
    slots: Arc<Semaphore>,
    concurrency: usize,
}

impl Uploader {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = tether_config::clamp_uploads(concurrency);
        Self {
            slots: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Upload every item, one outcome per item in completion order.
    ///
    /// Each outcome is also sent on `progress_tx` as soon as it is known. After `cancel`
    /// fires, uploads that have not started are reported as failures without touching the
    /// network; those already running finish.
    pub async fn upload_batch(
        &self,
        peer: &PeerClient,
        folder: &str,
        items: Vec<UploadRequest>,
        progress_tx: Option<Sender<TransferOutcome>>,
        cancel: &CancellationToken,
    ) -> Vec<TransferOutcome> {
        stream::iter(items)
            .map(|item| {
                let tx = progress_tx.clone();
                let slots = self.slots.clone();
                async move {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            TransferOutcome::failure(&item.relative_path, "cancelled")
                        }
                        permit = slots.acquire_owned() => match permit {
                            Ok(_permit) => {
                                debug!("Uploading {}", item.relative_path);
                                peer.upload_file(folder, &item.relative_path, &item.source_path)
                                    .await
                            }
                            Err(_) => TransferOutcome::failure(&item.relative_path, "upload slots closed"),
                        }
                    };
                    if !outcome.is_success() {
                        warn!(
                            "Upload of {} failed: {}",
                            outcome.relative_path,
                            outcome.message.as_deref().unwrap_or("unknown error")
                        );
                    }
                    if let Some(ref t) = tx {
                        let _ = t.send(outcome.clone()).await;
                    }
                    outcome
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}
