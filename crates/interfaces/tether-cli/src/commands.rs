use crate::Workspace;
use anyhow::Context;
use camino::Utf8PathBuf;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tether_core::TransferStatus;
use tether_pipeline::{DeleteOutcome, ProgressTracker, SyncError, SyncReport};
use tokio_util::sync::CancellationToken;

/// Cancel `token` on Ctrl-C. Uploads already in flight still finish.
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(":: Interrupted, finishing uploads in flight...");
            token.cancel();
        }
    })
}

pub async fn cmd_scan(
    ws: &Workspace,
    name: &str,
    output: Option<Utf8PathBuf>,
) -> anyhow::Result<()> {
    let base = ws.registry.base_path(name)?;
    println!(":: Scanning '{}': {}", name, base);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Hashing changed files...");

    let engine = ws.engine()?;
    let (state, stats) = engine.detector().classify_detailed(name, &base).await?;
    pb.finish_with_message("Scan complete.");

    println!("   Files:   {}", stats.scanned);
    println!("   Reused:  {}", stats.reused);
    println!("   Hashed:  {}", stats.hashed);
    println!("   Removed: {}", stats.removed);
    if stats.skipped > 0 {
        println!("   Skipped: {} (vanished or unreadable)", stats.skipped);
    }

    if let Some(out) = output {
        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(&out, json).with_context(|| format!("Failed to write {out}"))?;
        println!(":: Saved folder state to {}", out);
    }

    Ok(())
}

/// Sync one folder, or every registered folder when `folder` is `None`.
///
/// Returns the reports of the folders that ran. Folders that failed outright are
/// printed and turn the whole command into an error once the rest have finished.
pub async fn cmd_sync(ws: &Workspace, folder: Option<String>) -> anyhow::Result<Vec<SyncReport>> {
    println!(":: Synchronizing...");
    if let Some(peer) = ws.registry.peer_address()? {
        println!("   Peer: {}", peer);
    }

    let engine = ws.engine()?;
    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    let engine_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match folder {
                Some(name) => {
                    let res = engine.sync_folder(&name, Some(tx), &cancel).await;
                    Ok::<_, SyncError>(vec![(name, res)])
                }
                None => engine.sync_all(Some(tx), &cancel).await,
            }
        }
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}",
        )?
        .progress_chars("=>-"),
    );
    pb.set_message("Planning...");

    let mut tracker = ProgressTracker::new();
    while let Some(outcome) = rx.recv().await {
        tracker.update(outcome);
        let snap = tracker.get_snapshot();
        pb.set_length(snap.total_files);
        pb.set_position(snap.uploaded_files + snap.failed_count);
        pb.set_message(format!(
            "{} sent, {}/s",
            format_size(snap.uploaded_bytes, DECIMAL),
            format_size(snap.speed_bps, DECIMAL)
        ));
    }

    let results = engine_handle.await??;
    interrupt.abort();
    pb.finish_with_message("Done");

    let mut reports = Vec::with_capacity(results.len());
    let mut failed_folders = 0usize;
    for (name, res) in results {
        match res {
            Ok(report) => {
                print_report(&report);
                reports.push(report);
            }
            Err(e) => {
                failed_folders += 1;
                println!("\n:: Folder '{}'", name);
                println!("   Status:   Failed: {}", e);
            }
        }
    }

    if failed_folders > 0 {
        anyhow::bail!("{failed_folders} folder(s) could not be synced");
    }
    Ok(reports)
}

fn print_report(report: &SyncReport) {
    println!("\n:: Folder '{}'", report.folder);
    println!(
        "   Hashed:   {} ({} unchanged)",
        report.classify.hashed, report.classify.reused
    );
    println!("   In sync:  {}", report.plan.in_sync.len());
    println!(
        "   Uploaded: {}/{} ({})",
        report.uploads_succeeded(),
        report.plan.to_upload.len(),
        format_size(report.transfer.bytes_sent(), DECIMAL)
    );
    match &report.transfer.delete {
        DeleteOutcome::Skipped => {}
        DeleteOutcome::Succeeded { count } => println!("   Deleted:  {}", count),
        DeleteOutcome::Failed { message } => println!("   Deleted:  failed ({})", message),
    }

    for o in &report.transfer.outcomes {
        if o.status != TransferStatus::Success {
            println!(
                "   ! {}: {}",
                o.relative_path,
                o.message.as_deref().unwrap_or("failed")
            );
        }
    }

    if report.is_clean() {
        println!("   Status:   Up to date");
    } else {
        println!("   Status:   Incomplete (run `sync` again)");
    }
}

/// Sync every folder every `interval_secs` until Ctrl-C.
pub async fn cmd_watch(ws: &Workspace, interval_secs: u64) -> anyhow::Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    println!(
        ":: Watching {} folders every {}s (Ctrl-C to stop)",
        ws.registry.list()?.len(),
        interval.as_secs()
    );

    let engine = ws.engine()?;
    let shutdown = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(shutdown.clone());
    engine.watch(interval, None, shutdown).await;
    interrupt.abort();

    println!(":: Watch stopped.");
    Ok(())
}
