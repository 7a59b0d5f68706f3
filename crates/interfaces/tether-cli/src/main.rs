use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tether_cli::{commands, folders, Workspace};
use tether_config::DEFAULT_WATCH_INTERVAL_SECS;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Directory holding config.json and the metadata database.
    #[arg(long, global = true, env = "TETHER_CONFIG_DIR")]
    config_dir: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tracked folders
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },
    /// Show or change the peer that receives pushes
    Peer {
        #[command(subcommand)]
        command: PeerCommands,
    },
    /// Hash a folder and record its state without contacting the peer
    Scan {
        name: String,
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },
    /// Push one folder, or all of them, to the peer
    Sync { name: Option<String> },
    /// Sync all folders on a fixed interval until interrupted
    Watch {
        #[arg(short, long, default_value_t = DEFAULT_WATCH_INTERVAL_SECS)]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum FolderCommands {
    List,
    Add {
        #[arg(help = "Name shared with the peer")]
        name: String,
        path: Utf8PathBuf,
    },
    Remove {
        name: String,
    },
}

#[derive(Subcommand)]
enum PeerCommands {
    Show,
    Set {
        #[arg(help = "host:port or a full http(s) URL")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ws = Workspace::open(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Folder { command } => match command {
            FolderCommands::List => folders::handle_list(&ws)?,
            FolderCommands::Add { name, path } => folders::handle_add(&ws, &name, &path)?,
            FolderCommands::Remove { name } => folders::handle_remove(&ws, &name)?,
        },
        Commands::Peer { command } => match command {
            PeerCommands::Show => folders::handle_show_peer(&ws)?,
            PeerCommands::Set { address } => folders::handle_set_peer(&ws, &address)?,
        },
        Commands::Scan { name, output } => commands::cmd_scan(&ws, &name, output).await?,
        Commands::Sync { name } => {
            commands::cmd_sync(&ws, name).await?;
        }
        Commands::Watch { interval } => commands::cmd_watch(&ws, interval).await?,
    }

    Ok(())
}
