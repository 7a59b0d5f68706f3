use camino::Utf8PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tether_core::plan::plan as reconcile;
use tether_core::TransferOutcome;
use tether_infra::net::Uploader;
use tether_persistence::{ConfigStore, MetadataStore};
use tether_scanner::ChangeDetector;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::sync::execute::{DefaultPlanExecutor, PlanExecutor, TransferReport};
use crate::sync::remote::{HttpRemoteStateProvider, RemoteStateProvider};
use crate::sync::{SyncError, SyncOptions, SyncReport};

pub struct DefaultSyncEngine {
    config: Arc<ConfigStore>,
    detector: Arc<ChangeDetector>,
    remote: Box<dyn RemoteStateProvider>,
    executor: Box<dyn PlanExecutor>,
}

impl DefaultSyncEngine {
    pub fn new(
        config: Arc<ConfigStore>,
        store: Arc<dyn MetadataStore>,
        client: reqwest::Client,
    ) -> Result<Self, SyncError> {
        let cfg = config.load().map_err(SyncError::from_storage)?;
        let opts = SyncOptions::from_config(&cfg);
        let detector = ChangeDetector::new(store, opts.hash_workers)
            .map_err(|e| SyncError::Local(e.to_string()))?;
        let remote = Box::new(HttpRemoteStateProvider::new(client.clone()));
        let executor = Box::new(DefaultPlanExecutor::new(
            client,
            Uploader::new(opts.max_uploads),
        ));
        Ok(Self {
            config,
            detector: Arc::new(detector),
            remote,
            executor,
        })
    }

    pub fn with_components(
        config: Arc<ConfigStore>,
        detector: Arc<ChangeDetector>,
        remote: Box<dyn RemoteStateProvider>,
        executor: Box<dyn PlanExecutor>,
    ) -> Self {
        Self {
            config,
            detector,
            remote,
            executor,
        }
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    /// Reconcile one tracked folder with the peer.
    ///
    /// Configuration problems fail before any network activity. Local classification
    /// and the remote fetch run concurrently; planning waits for both.
    pub async fn sync_folder(
        &self,
        folder_name: &str,
        progress_tx: Option<Sender<TransferOutcome>>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let cfg = self.config.load().map_err(SyncError::from_storage)?;
        let folder = cfg.folder(folder_name).ok_or_else(|| {
            SyncError::Configuration(format!("folder '{folder_name}' is not registered"))
        })?;
        let peer = cfg
            .client
            .dest_address
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| SyncError::Configuration("no peer address configured".into()))?;
        let base = Utf8PathBuf::from(&folder.base_path);
        if !base.is_dir() {
            return Err(SyncError::Configuration(format!(
                "base path {base} of '{folder_name}' is missing"
            )));
        }
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        info!("Syncing '{}' from {} to {}", folder_name, base, peer);
        let local_fut = async {
            self.detector
                .classify_detailed(folder_name, &base)
                .await
                .map_err(SyncError::from_scanner)
        };
        let remote_fut = self.remote.fetch_folder_state(&peer, folder_name);
        let ((local, classify), remote) = tokio::try_join!(local_fut, remote_fut)?;

        let plan = reconcile(&local, &remote);
        info!(
            "Plan for '{}': {} to upload, {} to delete, {} in sync",
            folder_name,
            plan.to_upload.len(),
            plan.to_delete.len(),
            plan.in_sync.len()
        );

        let transfer = if plan.is_noop() {
            TransferReport::empty()
        } else {
            self.executor
                .execute(&plan, &base, folder_name, &peer, progress_tx, cancel)
                .await?
        };

        Ok(SyncReport {
            folder: folder_name.to_string(),
            plan,
            classify,
            transfer,
        })
    }

    /// Sync every registered folder in name order. One folder failing does not stop the rest.
    pub async fn sync_all(
        &self,
        progress_tx: Option<Sender<TransferOutcome>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, Result<SyncReport, SyncError>)>, SyncError> {
        let cfg = self.config.load().map_err(SyncError::from_storage)?;
        let mut results = Vec::with_capacity(cfg.folders.len());
        for name in cfg.folders.keys() {
            if cancel.is_cancelled() {
                results.push((name.clone(), Err(SyncError::Cancelled)));
                continue;
            }
            let res = self.sync_folder(name, progress_tx.clone(), cancel).await;
            if let Err(e) = &res {
                error!("Sync of '{}' failed: {}", name, e);
            }
            results.push((name.clone(), res));
        }
        Ok(results)
    }

    /// Run [`Self::sync_all`] every `interval` until `shutdown` fires.
    ///
    /// A run in progress when `shutdown` fires stops starting new uploads and finishes
    /// the ones already in flight.
    pub async fn watch(
        &self,
        interval: Duration,
        progress_tx: Option<Sender<TransferOutcome>>,
        shutdown: CancellationToken,
    ) {
        let mut runs = 0u64;
        loop {
            runs += 1;
            match self.sync_all(progress_tx.clone(), &shutdown).await {
                Ok(results) => {
                    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                    info!(
                        "Watch run {} finished: {} folders, {} failed",
                        runs,
                        results.len(),
                        failed
                    );
                }
                Err(e) => warn!("Watch run {} could not start: {}", runs, e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Watch loop stopped after {} runs", runs);
    }
}
