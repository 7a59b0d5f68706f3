use camino::Utf8Path;
use reqwest::Client;
use tether_core::path_utils::TetherPath;
use tether_core::{ReconciliationPlan, TransferOutcome};
use tether_infra::net::{PeerClient, UploadRequest, Uploader};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sync::remote::net_error;
use crate::sync::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing to delete; no request was sent.
    Skipped,
    Succeeded { count: usize },
    Failed { message: String },
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    /// One entry per planned upload, in completion order.
    pub outcomes: Vec<TransferOutcome>,
    pub delete: DeleteOutcome,
}

impl TransferReport {
    pub fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            delete: DeleteOutcome::Skipped,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes).sum()
    }
}

#[async_trait::async_trait]
pub trait PlanExecutor: Send + Sync {
    /// Apply `plan` to the peer at `remote_target`.
    ///
    /// Per-file failures are reported in the result; only an unusable peer address is an error.
    async fn execute(
        &self,
        plan: &ReconciliationPlan,
        base_path: &Utf8Path,
        folder_name: &str,
        remote_target: &str,
        progress_tx: Option<Sender<TransferOutcome>>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, SyncError>;
}

pub struct DefaultPlanExecutor {
    client: Client,
    uploader: Uploader,
}

impl DefaultPlanExecutor {
    pub fn new(client: Client, uploader: Uploader) -> Self {
        Self { client, uploader }
    }
}

async fn delete_batch(
    peer: &PeerClient,
    folder_name: &str,
    plan: &ReconciliationPlan,
    cancel: &CancellationToken,
) -> DeleteOutcome {
    if plan.to_delete.is_empty() {
        return DeleteOutcome::Skipped;
    }
    if let Some(bad) = plan.to_delete.iter().find(|p| !TetherPath::verify_safe(p)) {
        return DeleteOutcome::Failed {
            message: format!("refusing unsafe path {bad:?}"),
        };
    }
    if cancel.is_cancelled() {
        return DeleteOutcome::Failed {
            message: "cancelled".into(),
        };
    }

    let paths: Vec<String> = plan.to_delete.iter().cloned().collect();
    let count = paths.len();
    match peer.delete_files(folder_name, paths).await {
        Ok(()) => DeleteOutcome::Succeeded { count },
        Err(e) => {
            warn!("Delete batch for '{}' failed: {}", folder_name, e);
            DeleteOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl PlanExecutor for DefaultPlanExecutor {
    async fn execute(
        &self,
        plan: &ReconciliationPlan,
        base_path: &Utf8Path,
        folder_name: &str,
        remote_target: &str,
        progress_tx: Option<Sender<TransferOutcome>>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, SyncError> {
        let peer = PeerClient::new(self.client.clone(), remote_target).map_err(net_error)?;

        let requests: Vec<UploadRequest> = plan
            .to_upload
            .iter()
            .map(|rel_path| UploadRequest {
                relative_path: rel_path.clone(),
                source_path: base_path.join(rel_path),
            })
            .collect();

        let (outcomes, delete) = tokio::join!(
            self.uploader
                .upload_batch(&peer, folder_name, requests, progress_tx, cancel),
            delete_batch(&peer, folder_name, plan, cancel)
        );

        let report = TransferReport { outcomes, delete };
        info!(
            "Transfers for '{}': {} uploaded, {} failed, delete {:?}",
            folder_name,
            report.succeeded(),
            report.failed(),
            report.delete
        );
        Ok(report)
    }
}
