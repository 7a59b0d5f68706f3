use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use std::sync::Arc;
use tether_persistence::{ConfigStore, RedbMetadataStore};
use tether_scanner::ChangeDetector;
use tether_server::{serve, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Receive folders pushed by tether clients.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding config.json; the platform default is used when omitted.
    #[arg(long, env = "TETHER_CONFIG_DIR")]
    config_dir: Option<Utf8PathBuf>,
    /// Listen address, overriding `server.bind_address` from the configuration.
    #[arg(long)]
    bind: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => ConfigStore::default_dir()?,
    };
    let config = Arc::new(ConfigStore::open(&config_dir)?);
    let cfg = config.load().context("reading configuration")?;

    // Kept apart from the client's database so both can run from one config dir.
    let store = Arc::new(
        RedbMetadataStore::open(&config_dir.join("peer")).context("opening metadata store")?,
    );
    let detector = Arc::new(ChangeDetector::new(store, cfg.concurrency.max_workers)?);

    let bind = args.bind.unwrap_or_else(|| cfg.server.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(
        "Serving {} folders on {}",
        cfg.folders.len(),
        listener.local_addr()?
    );

    let state = AppState::new(config, detector);
    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await?;
    Ok(())
}
