//! # Connectivity Monitor
//!
//! Holds the register's online/offline flag and reports when it flips.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Connectivity                                         │
//! │                                                                         │
//! │   ReachabilityProbe ──poll──► SyncAgent::on_reachability_change(bool)  │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                         ConnectivityMonitor::set_online                 │
//! │                                     │                                   │
//! │            ┌────────────────────────┼───────────────────────┐          │
//! │            ▼                        ▼                       ▼          │
//! │       CameOnline               WentOffline              Unchanged       │
//! │   drain queue, then         flag only                   nothing         │
//! │   refresh pending count                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

/// Result of feeding a reachability reading into the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline,
    Unchanged,
}

/// The single online/offline flag, observable through a watch channel.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor seeded from the platform's current reachability.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        ConnectivityMonitor { state }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Records a reachability reading.
    pub fn set_online(&self, online: bool) -> Transition {
        let mut transition = Transition::Unchanged;

        self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            transition = if online {
                Transition::CameOnline
            } else {
                Transition::WentOffline
            };
            true
        });

        match transition {
            Transition::CameOnline => info!("Connectivity restored"),
            Transition::WentOffline => info!("Connectivity lost"),
            Transition::Unchanged => {}
        }

        transition
    }

    /// Receiver that wakes on every flip.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

// =============================================================================
// Reachability Probes
// =============================================================================

/// Platform reachability signal.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Treats the network as reachable when a TCP connection to `target`
/// succeeds within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpReachability {
    target: String,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        TcpReachability {
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpReachability {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(target = %self.target, error = %e, "Reachability check failed");
                false
            }
            Err(_) => {
                debug!(target = %self.target, "Reachability check timed out");
                false
            }
        }
    }
}
