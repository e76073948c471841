//! # Meridian Register Service
//!
//! Headless host for the register's offline-first core. It owns startup
//! and shutdown; the UI layer talks to the services it exposes.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration (file, then `MERIDIAN_*` overrides)
//! 3. Open the local store and run migrations
//! 4. Start the sync agent (initial probe + drain, watcher, retry task)
//! 5. Refresh reference data, receipt settings included
//! 6. Run until ctrl-c, then stop background tasks

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use meridian_db::{Database, DbConfig};
use meridian_sync::{RefreshOutcome, SyncAgent, SyncConfig, SyncEventEmitter, SyncStatus};

/// Forwards agent events to the log.
pub struct LogEmitter;

impl SyncEventEmitter for LogEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        match serde_json::to_string(status) {
            Ok(json) => info!(target: "meridian::status", status = %json, "Sync status"),
            Err(e) => warn!(error = %e, "Failed to serialize sync status"),
        }
    }

    fn emit_progress(&self, pending: u64, synced: usize) {
        info!(target: "meridian::status", pending, synced, "Sync progress");
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        warn!(target: "meridian::status", retryable, "{message}");
    }
}

/// Runs the register service until ctrl-c.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = SyncConfig::load_or_default(None);
    config.validate().context("invalid register configuration")?;

    let db = open_database(&config).await?;
    let mut agent = build_agent(config, db)?;

    agent.start().await.context("failed to start sync agent")?;

    match agent.refresh(true).await {
        Ok(outcome) => log_refresh(&outcome),
        Err(e) => error!(error = %e, "Initial reference refresh failed"),
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("Shutdown requested");
    agent.shutdown().await?;
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=meridian_sync=trace` - Trace the sync layer only
/// - Default: INFO, DEBUG for meridian crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meridian=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves the store path: `MERIDIAN_DB_PATH` / config, then the platform
/// data directory.
fn database_path(config: &SyncConfig) -> anyhow::Result<PathBuf> {
    config
        .database_path()
        .ok_or_else(|| anyhow!("could not determine app data directory"))
}

async fn open_database(config: &SyncConfig) -> anyhow::Result<Database> {
    let path = database_path(config)?;
    info!(path = %path.display(), "Opening local store");

    Database::new(DbConfig::new(path))
        .await
        .context("failed to open local store")
}

fn build_agent(config: SyncConfig, db: Database) -> anyhow::Result<SyncAgent> {
    SyncAgent::from_config_with_emitter(config, db, Arc::new(LogEmitter))
        .context("failed to build sync agent")
}

fn log_refresh(outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Fresh { snapshot, sync } => info!(
            branches = snapshot.branches.len(),
            products = snapshot.products.len(),
            active_branch = ?snapshot.active_branch_id,
            replayed = sync.synced,
            "Reference data refreshed"
        ),
        RefreshOutcome::Cached(snapshot) => info!(
            branches = snapshot.branches.len(),
            products = snapshot.products.len(),
            "Offline; serving cached reference data"
        ),
        RefreshOutcome::ServerUnreachable { reason } => {
            warn!(%reason, "Server failed its health check; keeping cached data")
        }
    }
}
