//! # Sync Configuration
//!
//! Configuration for the register's server conversation and offline queue.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERIDIAN_SERVER_URL=http://10.0.0.5:3000                           │
//! │     MERIDIAN_BRANCH_ID=2                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/register/register.toml (Linux)                           │
//! │     ~/Library/Application Support/com.meridian.register/register.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     http://localhost:3000, 30 s timeout, generated device id           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # register.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Register 1"
//!
//! [server]
//! base_url = "http://192.168.1.10:3000"
//! request_timeout_secs = 30
//!
//! [sync]
//! reachability_poll_secs = 5
//! reachability_timeout_ms = 2000
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//! retry_enabled = true
//!
//! [store]
//! database_path = "/var/lib/meridian/register.db"
//! default_branch_id = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Register 1").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Register".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Where the authoritative store server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL; endpoint paths such as `/api/orders` are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for every server call (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Connectivity polling and queue retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between reachability checks (seconds).
    #[serde(default = "default_poll_interval")]
    pub reachability_poll_secs: u64,

    /// How long a reachability check may take (milliseconds).
    #[serde(default = "default_reachability_timeout")]
    pub reachability_timeout_ms: u64,

    /// `host:port` probed for reachability. Defaults to the server's address.
    #[serde(default)]
    pub reachability_target: Option<String>,

    /// Initial backoff before re-attempting a blocked queue (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff between queue retries (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Whether the background retry task runs at all.
    #[serde(default = "default_true")]
    pub retry_enabled: bool,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_reachability_timeout() -> u64 {
    2000
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            reachability_poll_secs: default_poll_interval(),
            reachability_timeout_ms: default_reachability_timeout(),
            reachability_target: None,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            retry_enabled: default_true(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Branch to mirror products for when none has been chosen yet.
    #[serde(default)]
    pub default_branch_id: Option<i64>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (register.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load register config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Register config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        let url = self.base_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Server URL must start with http:// or https://, got: {}",
                self.server.base_url
            )));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.reachability_poll_secs == 0 || self.sync.reachability_timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "reachability intervals must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `MERIDIAN_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("MERIDIAN_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("MERIDIAN_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = lookup("MERIDIAN_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.base_url = url;
        }

        if let Some(secs) = lookup("MERIDIAN_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.server.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid MERIDIAN_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Some(target) = lookup("MERIDIAN_REACHABILITY_TARGET") {
            self.sync.reachability_target = Some(target);
        }

        if let Some(enabled) = lookup("MERIDIAN_RETRY_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sync.retry_enabled = true,
                "0" | "false" | "no" => self.sync.retry_enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid MERIDIAN_RETRY_ENABLED"),
            }
        }

        if let Some(path) = lookup("MERIDIAN_DB_PATH") {
            self.store.database_path = Some(PathBuf::from(path));
        }

        if let Some(branch) = lookup("MERIDIAN_BRANCH_ID") {
            if let Ok(id) = branch.parse::<i64>() {
                debug!(branch_id = id, "Overriding default branch from environment");
                self.store.default_branch_id = Some(id);
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "meridian", "register")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("register.toml"))
    }

    /// Returns the default database path.
    pub fn default_database_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("register.db"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Parses the server base URL.
    pub fn base_url(&self) -> SyncResult<Url> {
        Ok(Url::parse(&self.server.base_url)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn reachability_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.reachability_poll_secs)
    }

    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.reachability_timeout_ms)
    }

    /// The `host:port` whose reachability decides online/offline.
    pub fn reachability_target(&self) -> SyncResult<String> {
        if let Some(target) = &self.sync.reachability_target {
            return Ok(target.clone());
        }

        let url = self.base_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidUrl(format!("{} has no host", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidUrl(format!("{} has no port", url)))?;

        Ok(format!("{host}:{port}"))
    }

    /// Database file, falling back to the platform data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.store
            .database_path
            .clone()
            .or_else(Self::default_database_path)
    }
}
