//! Tapdeck controller (tapdeck-ctl) - Main entry point
//!
//! Runs the presence source feeding the session controller, and the
//! position tracker, until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tapdeck_common::config::{ConfigOrigin, Overrides, Settings, TomlConfig};
use tapdeck_ctl::content::ContentResolver;
use tapdeck_ctl::player::{MopidyClient, Player};
use tapdeck_ctl::presence::{CommandTagReader, PresenceSource};
use tapdeck_ctl::store::PositionStore;
use tapdeck_ctl::tracker::PositionTracker;
use tapdeck_ctl::{SessionController, SharedSession};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A slow controller stalls the reader before its next poll
const PRESENCE_QUEUE_CAPACITY: usize = 1;

/// Command-line arguments for tapdeck-ctl
#[derive(Parser, Debug)]
#[command(name = "tapdeck-ctl")]
#[command(about = "Token-triggered audiobook jukebox controller")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "TAPDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Mopidy JSON-RPC endpoint
    #[arg(long, env = "TAPDECK_PLAYER_URL")]
    player_url: Option<String>,

    /// Content manifest URL
    #[arg(long, env = "TAPDECK_MANIFEST_URL")]
    manifest_url: Option<String>,

    /// Local content library (the player's media directory)
    #[arg(long, env = "TAPDECK_LIBRARY_PATH")]
    library_path: Option<PathBuf>,

    /// Position store file
    #[arg(long, env = "TAPDECK_STATE_FILE")]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml, origin) = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration file")?;

    // Initialize tracing
    let level = toml.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tapdeck_ctl={0},tapdeck_common={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &origin {
        ConfigOrigin::File(path) => info!(path = %path.display(), "Loaded configuration file"),
        ConfigOrigin::Defaults => warn!("No configuration file found, using defaults"),
    }

    let overrides = Overrides {
        player_url: args.player_url,
        manifest_url: args.manifest_url,
        library_path: args.library_path,
        state_file: args.state_file,
    };
    let settings = Settings::resolve(overrides, toml).context("Invalid configuration")?;

    info!("Starting tapdeck controller");
    info!("Player: {}", settings.player_url);
    info!("Manifest: {}", settings.manifest_url);
    info!("Library: {}", settings.library_path.display());

    std::fs::create_dir_all(&settings.library_path)
        .context("Failed to create library directory")?;
    std::fs::create_dir_all(&settings.scratch_dir)
        .context("Failed to create scratch directory")?;

    let store = PositionStore::open(&settings.state_file).context("Failed to open position store")?;
    let session = SharedSession::new(store);

    let player: Arc<dyn Player> = Arc::new(
        MopidyClient::new(settings.player_url.clone(), settings.library_scan_command.clone())
            .context("Failed to create player client")?,
    );
    let resolver = Arc::new(
        ContentResolver::from_settings(&settings).context("Failed to create content resolver")?,
    );

    let tracker = PositionTracker::new(
        Arc::clone(&player),
        Arc::clone(&resolver),
        session.clone(),
        settings.tracker_interval,
    );
    tokio::spawn(tracker.run());

    let reader = CommandTagReader::new(&settings.reader_command).context("Invalid reader command")?;
    let (source, events) = PresenceSource::spawn(reader, settings.poll_interval, PRESENCE_QUEUE_CAPACITY)
        .context("Failed to start presence source")?;

    let controller = SessionController::new(player, resolver, session);

    tokio::select! {
        _ = controller.run(events) => {
            info!("Presence source ended");
        },
        _ = shutdown_signal() => {},
    }

    source.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
