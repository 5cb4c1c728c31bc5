//! pagedit - live page editing with version history.
//!
//! This is the main entry point for the pagedit CLI.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use pagedit_snapshot::{format_diff, DiffResult, SnapshotConfig, SnapshotStore};
use pagedit_util::log::LogConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "pagedit")]
#[command(author, version, about = "Edit rendered pages and write the changes back to source", long_about = None)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Version storage directory, relative to the project root
    #[arg(long, global = true)]
    versions_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the edit server
    Serve {
        /// Address to bind to
        #[arg(short, long)]
        address: Option<SocketAddr>,
    },
    /// List recorded versions
    Versions {
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show changes made since the checkpoint version
    Diff {
        /// Print output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        print_version();
        return Ok(());
    }

    let root = match &cli.root {
        Some(root) => root
            .canonicalize()
            .with_context(|| format!("Project root {} not found", root.display()))?,
        None => std::env::current_dir()?,
    };
    let (mut config, sources) = Config::load(&root)
        .await
        .context("Failed to load configuration")?;
    if cli.versions_dir.is_some() {
        config.versions_dir = cli.versions_dir.clone();
    }

    pagedit_util::log::init(LogConfig {
        level: config.log_level(),
        verbose: cli.verbose,
        ..Default::default()
    });
    for source in &sources {
        tracing::debug!(path = %source.display(), "Loaded config");
    }

    match cli.command {
        None => run_server(&config, &root).await,
        Some(Commands::Serve { address }) => {
            if address.is_some() {
                config.address = address;
            }
            run_server(&config, &root).await
        }
        Some(Commands::Versions { json }) => list_versions(&config, &root, json).await,
        Some(Commands::Diff { json }) => show_diff(&config, &root, json).await,
        Some(Commands::Version) => Ok(()),
    }
}

async fn open_store(config: &Config, root: &Path) -> anyhow::Result<SnapshotStore> {
    let versions_dir = config.versions_dir(root);
    SnapshotStore::new(
        versions_dir.clone(),
        root.to_path_buf(),
        SnapshotConfig {
            storage_warn_bytes: config.storage_warn_bytes(),
        },
    )
    .await
    .with_context(|| format!("Failed to open version store at {}", versions_dir.display()))
}

/// Run the edit server.
async fn run_server(config: &Config, root: &Path) -> anyhow::Result<()> {
    let address = config.address();
    info!("Starting pagedit server for {}", root.display());

    let store = open_store(config, root).await?;
    let state = pagedit_server::AppState::new(store);
    let app = pagedit_server::create_router(state);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server listening on http://{}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_versions(config: &Config, root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(config, root).await?;
    let list = store.list_versions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if list.versions.is_empty() {
        println!("No versions recorded.");
        return Ok(());
    }

    for entry in &list.versions {
        let marker = if list.checkpoint_id == Some(entry.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{} v{:<4} {}  {:<30} {} file(s)",
            marker,
            entry.id,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.label,
            entry.file_count
        );
    }

    Ok(())
}

async fn show_diff(config: &Config, root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(config, root).await?;
    let current = store.current_diff().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&current)?);
        return Ok(());
    }

    let Some(id) = current.compared_to else {
        println!("No checkpoint version to compare against.");
        return Ok(());
    };
    if current.diffs.is_empty() {
        println!("No changes since version {}.", id);
        return Ok(());
    }

    for file in current.diffs {
        println!(
            "{} (+{} -{}) vs v{}",
            file.file, file.stats.added, file.stats.removed, id
        );
        let diff = DiffResult {
            hunks: file.hunks,
            stats: file.stats,
        };
        println!("{}", format_diff(&diff));
        println!();
    }

    Ok(())
}

fn print_version() {
    println!("pagedit {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Edit rendered pages in the browser and keep a version history.");
}
