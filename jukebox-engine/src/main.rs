//! Jukebox - Main entry point
//!
//! Runs the queue/player engine with the external-process preparer and the
//! headless playback backend, enqueues the URLs given on the command line and
//! logs every published snapshot until interrupted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_common::Config;
use jukebox_engine::backend::{HeadlessPlayback, Preparer, ProcessPreparer};
use jukebox_engine::{Player, PlayerSettings, Queue, QueueSettings};
use serde::Serialize;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for jukebox
#[derive(Parser, Debug)]
#[command(name = "jukebox")]
#[command(about = "Shared playback queue with fair scheduling")]
#[command(version)]
struct Args {
    /// Config file (default: platform config dir, then /etc/jukebox)
    #[arg(short, long, env = "JUKEBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact directory, overrides the config file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Request video for the given URLs
    #[arg(long)]
    video: bool,

    /// Media URLs to enqueue
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "jukebox={v},jukebox_engine={v},jukebox_common={v}",
                    v = config.verbosity
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jukebox");
    info!("Data directory: {}", config.data_dir.display());

    prepare_data_dir(&config).await?;

    let (player, player_rx) = Player::new(
        Arc::new(HeadlessPlayback::new()),
        PlayerSettings::from_config(&config),
    );
    let heartbeat = player.spawn_heartbeat(config.heartbeat_interval());

    let preparer: Arc<dyn Preparer> = Arc::new(ProcessPreparer::from_config(&config));
    let (queue, queue_rx) = Queue::new(
        Arc::clone(&player),
        Arc::clone(&preparer),
        QueueSettings::from_config(&config),
    );

    let queue_updates = tokio::spawn(drain_updates("queue", queue_rx));
    let player_updates = tokio::spawn(drain_updates("player", player_rx));

    for url in &args.urls {
        if !preparer.validate_url(url).await {
            warn!("Rejected URL {}", url);
            continue;
        }
        match preparer.info(url, args.video).await {
            Ok(media) => {
                queue.add(media, 0).await;
            }
            Err(e) => error!("Could not look up {}: {}", url, e),
        }
    }

    shutdown_signal().await;

    heartbeat.abort();
    queue_updates.abort();
    player_updates.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Create `<data_dir>/internal` and install the quiet placeholder if one is
/// configured.
async fn prepare_data_dir(config: &Config) -> Result<()> {
    let quiet = jukebox_common::Media::be_quiet();
    let target = quiet.artifact_path(&config.data_dir, config.video_transcoding);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    if let Some(asset) = &config.quiet_asset {
        install_asset(asset, &target).await?;
    } else if !target.is_file() {
        warn!("No quiet asset configured, be quiet will play silence");
    }
    Ok(())
}

async fn install_asset(asset: &Path, target: &Path) -> Result<()> {
    tokio::fs::copy(asset, target)
        .await
        .with_context(|| format!("Failed to install quiet asset {}", asset.display()))?;
    info!("Installed quiet asset {}", asset.display());
    Ok(())
}

/// Stand-in for the pub/sub hub: keep the channel drained and log each
/// snapshot.
async fn drain_updates<T: Serialize>(name: &'static str, mut rx: mpsc::Receiver<T>) {
    while let Some(snapshot) = rx.recv().await {
        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!("{} update: {}", name, json),
            Err(e) => warn!("Could not serialize {} update: {}", name, e),
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
