//! # Store Handle
//!
//! Opens the register's SQLite file and hands out repositories over one
//! shared pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new("register.db")        DbConfig::in_memory()              │
//! │       │  WAL, synchronous=NORMAL,         │  one pinned connection      │
//! │       │  foreign keys, busy timeout       │  (tests)                    │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │  Database::new ── create parent dir ── connect ── migrate               │
//! │                      │                                                  │
//! │        ┌─────────────┼──────────────────┐                               │
//! │        ▼             ▼                  ▼                               │
//! │   sync_queue()   reference()        settings()                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A committed enqueue must survive the register being switched off, so file
//! stores always journal through WAL.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::reference::ReferenceRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::sync_queue::SyncQueueRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private in-memory database; gone when the pool closes.
    Memory,
}

/// How to open the local store.
///
/// ```rust,ignore
/// let config = DbConfig::new(data_dir.join("register.db")).pool_size(4);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: StoreLocation,

    /// Upper bound on open connections. Default: 5
    pub pool_size: u32,

    /// How long a caller waits for a free connection. Default: 30 seconds
    pub acquire_timeout: Duration,

    /// How long SQLite retries a locked database before failing a
    /// statement. Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply pending migrations while opening. Default: true
    pub migrate: bool,
}

impl DbConfig {
    /// File-backed store. The file and its directory are created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: StoreLocation::File(path.into()),
            pool_size: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// In-memory store for tests, limited to one connection so every
    /// repository sees the same database.
    pub fn in_memory() -> Self {
        DbConfig {
            location: StoreLocation::Memory,
            pool_size: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn skip_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.location == StoreLocation::Memory
    }

    /// File path, if this is a file store.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            StoreLocation::File(path) => Some(path),
            StoreLocation::Memory => None,
        }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        match &self.location {
            StoreLocation::Memory => options.in_memory(true),
            StoreLocation::File(path) => options
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
        }
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.pool_size)
            .min_connections(1)
            .acquire_timeout(self.acquire_timeout);

        if self.is_in_memory() {
            // Recycling the only connection would drop the database with it.
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Some(Duration::from_secs(600)))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the local store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store described by `config`, migrating it unless told not
    /// to.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match config.path() {
            Some(path) => {
                info!(path = %path.display(), "Opening local store");
                ensure_parent_dir(path)?;
            }
            None => debug!("Opening in-memory store"),
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };

        if config.migrate {
            db.run_migrations().await?;
        }

        info!(pool_size = config.pool_size, "Local store ready");
        Ok(db)
    }

    /// Applies any migrations the store hasn't seen yet.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The offline write queue.
    ///
    /// ```rust,ignore
    /// let entry = db.sync_queue().enqueue(&operation).await?;
    /// ```
    pub fn sync_queue(&self) -> SyncQueueRepository {
        SyncQueueRepository::new(self.pool.clone())
    }

    /// Mirrors of server reference data.
    pub fn reference(&self) -> ReferenceRepository {
        ReferenceRepository::new(self.pool.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        debug!("Closing local store");
        self.pool.close().await;
    }

    /// True if the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn ensure_parent_dir(path: &Path) -> DbResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
