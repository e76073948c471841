//! # meridian-sync: Offline-first services for the Meridian register
//!
//! Everything that talks to the store server lives here: the order path
//! that falls back to the local queue, the engine that replays that queue,
//! the connectivity monitor, and the reference data refresher.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Agent                                     │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SyncAgent (orchestrator)                        │  │
//! │  │  reachability watcher task + retry task, status + emitter        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ OrderService   │  │  SyncEngine    │  │  CacheRefresher        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ online submit  │  │ FIFO replay,   │  │ health probe, drain,   │    │
//! │  │ or queue with  │  │ stop at first  │  │ then pull branches,    │    │
//! │  │ placeholder id │  │ failure        │  │ products, users ...    │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          │                   │                       │                  │
//! │          └──────────┬────────┴───────────┬───────────┘                  │
//! │                     ▼                    ▼                              │
//! │          ┌────────────────────┐  ┌────────────────────┐                │
//! │          │ ServerApi (HTTP)   │  │ meridian-db        │                │
//! │          │ /api/orders ...    │  │ queue + mirrors    │                │
//! │          └────────────────────┘  └────────────────────┘                │
//! │                                                                         │
//! │  ConnectivityMonitor: online flag every service reads before network   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent` orchestrator and status events
//! - [`client`] - `ServerApi` trait and its reqwest implementation
//! - [`config`] - Register configuration (device, server, timings, store)
//! - [`connectivity`] - Online/offline state and reachability probes
//! - [`engine`] - FIFO replay of the sync queue
//! - [`error`] - Sync error types
//! - [`orders`] - Order submission with offline fallback
//! - [`refresher`] - Reference data refresh with health gate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_sync::{SyncAgent, SyncConfig};
//! use meridian_db::{Database, DbConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(config.database_path())).await?;
//!
//! let mut agent = SyncAgent::from_config(config, db)?;
//! agent.start().await?;
//!
//! let outcome = agent.submit_order(draft).await;
//! println!("pending: {}", agent.status().await.pending_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod orders;
pub mod refresher;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{NoOpEmitter, SyncAgent, SyncEventEmitter, SyncStatus};
pub use client::{HttpServerApi, LoyaltyCredit, ServerApi, WriteAck};
pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, ReachabilityProbe, TcpReachability, Transition};
pub use engine::{HaltInfo, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use orders::{OrderService, PlaceholderIds, SubmitOutcome, SubmitResponse, WriteOutcome};
pub use refresher::{CacheRefresher, RefreshOutcome, RefreshSnapshot};
