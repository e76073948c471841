//! # Sync Agent
//!
//! Wires connectivity, the order service, the sync engine and the cache
//! refresher together, and runs the background tasks that keep the queue
//! moving.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncAgent                                │  │
//! │  │                                                                  │  │
//! │  │  • start(): probe, startup drain, spawn background tasks         │  │
//! │  │  • on_reachability_change(): drain on reconnect                  │  │
//! │  │  • Publishes SyncStatus through SyncEventEmitter                 │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ Reachability   │  │ Retry task     │  │ OrderService /         │    │
//! │  │ watcher        │  │                │  │ CacheRefresher         │    │
//! │  │                │  │ Re-drains a    │  │                        │    │
//! │  │ Polls probe,   │  │ blocked queue  │  │ Called by the register │    │
//! │  │ feeds flips    │  │ with backoff   │  │ UI                     │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  STATUS EVENTS:                                                        │
//! │  ──────────────                                                        │
//! │  emit_status   - { online, serverHealthy, pendingCount, lastSync }     │
//! │  emit_progress - { pending: 2, synced: 3 }                             │
//! │  emit_error    - { message: "Server error (503)", retryable: true }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use meridian_core::OrderDraft;
use meridian_db::Database;

use crate::client::{HttpServerApi, ServerApi};
use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ReachabilityProbe, TcpReachability, Transition};
use crate::engine::{SyncEngine, SyncReport};
use crate::error::SyncResult;
use crate::orders::{OrderService, SubmitOutcome};
use crate::refresher::{CacheRefresher, RefreshOutcome};

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether the network is reachable.
    pub online: bool,

    /// False after the server failed a health probe while the network was up.
    pub server_healthy: bool,

    /// Number of writes waiting in the queue.
    pub pending_count: u64,

    /// Last drain that replayed at least one entry.
    pub last_sync: Option<DateTime<Utc>>,

    /// Last error message (if any).
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus {
            online: false,
            server_healthy: true,
            pending_count: 0,
            last_sync: None,
            last_error: None,
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for pushing sync events to the register UI.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits a sync progress event.
    fn emit_progress(&self, pending: u64, synced: usize);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: u64, _synced: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Shared Agent State
// =============================================================================

/// The parts of the agent its background tasks also need.
struct AgentCore {
    connectivity: Arc<ConnectivityMonitor>,
    engine: Arc<SyncEngine>,
    status: Arc<RwLock<SyncStatus>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl AgentCore {
    async fn on_reachability_change(&self, online: bool) -> SyncResult<Transition> {
        let transition = self.connectivity.set_online(online);

        match transition {
            Transition::CameOnline => {
                self.status.write().await.online = true;
                let drained = self.drain().await;
                self.publish_pending().await;
                drained?;
            }
            Transition::WentOffline => {
                self.status.write().await.online = false;
                self.publish_status().await;
            }
            Transition::Unchanged => {}
        }

        Ok(transition)
    }

    /// One engine pass, reflected into the status.
    async fn drain(&self) -> SyncResult<SyncReport> {
        let result = self.engine.sync_pending().await;

        match &result {
            Ok(report) if report.skipped_offline => {}
            Ok(report) => {
                {
                    let mut s = self.status.write().await;
                    s.pending_count = report.remaining;
                    if report.synced > 0 {
                        s.last_sync = Some(Utc::now());
                    }
                    match &report.halted {
                        Some(halt) => s.last_error = Some(halt.error.clone()),
                        None if report.attempted > 0 => s.last_error = None,
                        None => {}
                    }
                }

                if report.attempted > 0 {
                    self.emitter.emit_progress(report.remaining, report.synced);
                }
                if let Some(halt) = &report.halted {
                    self.emitter.emit_error(&halt.error, halt.retryable);
                }
            }
            Err(e) => {
                error!(error = %e, "Queue drain failed");
                self.status.write().await.last_error = Some(e.to_string());
                self.emitter.emit_error(&e.to_string(), false);
            }
        }

        result
    }

    /// Re-reads the queue length and pushes the status out.
    async fn publish_pending(&self) {
        match self.engine.pending_count().await {
            Ok(count) => self.status.write().await.pending_count = count,
            Err(e) => warn!(error = %e, "Failed to read pending count"),
        }
        self.publish_status().await;
    }

    async fn publish_status(&self) {
        let s = self.status.read().await.clone();
        self.emitter.emit_status(&s);
    }
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Main sync agent that orchestrates all sync operations.
pub struct SyncAgent {
    /// Sync configuration.
    config: Arc<SyncConfig>,

    core: Arc<AgentCore>,

    probe: Arc<dyn ReachabilityProbe>,

    orders: Arc<OrderService>,

    refresher: Arc<CacheRefresher>,

    /// Shutdown senders, one per background task.
    shutdown_txs: Vec<mpsc::Sender<()>>,

    tasks: Vec<JoinHandle<()>>,
}

impl SyncAgent {
    /// Creates a new sync agent.
    pub fn new(
        config: SyncConfig,
        db: Database,
        api: Arc<dyn ServerApi>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        Self::with_emitter(config, db, api, probe, Arc::new(NoOpEmitter))
    }

    /// Creates a new sync agent with a custom event emitter.
    pub fn with_emitter(
        config: SyncConfig,
        db: Database,
        api: Arc<dyn ServerApi>,
        probe: Arc<dyn ReachabilityProbe>,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let connectivity = Arc::new(ConnectivityMonitor::new(false));
        let engine = Arc::new(SyncEngine::new(db.clone(), api.clone(), connectivity.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), api.clone(), connectivity.clone()));
        let refresher = Arc::new(
            CacheRefresher::new(db, api, connectivity.clone(), engine.clone())
                .with_default_branch(config.store.default_branch_id),
        );

        let core = Arc::new(AgentCore {
            connectivity,
            engine,
            status: Arc::new(RwLock::new(SyncStatus::default())),
            emitter,
        });

        SyncAgent {
            config: Arc::new(config),
            core,
            probe,
            orders,
            refresher,
            shutdown_txs: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Creates an agent talking HTTP to the configured server, with TCP
    /// reachability against the configured target.
    pub fn from_config(config: SyncConfig, db: Database) -> SyncResult<Self> {
        Self::from_config_with_emitter(config, db, Arc::new(NoOpEmitter))
    }

    /// Like [`SyncAgent::from_config`], with events going to `emitter`.
    pub fn from_config_with_emitter(
        config: SyncConfig,
        db: Database,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let api = Arc::new(HttpServerApi::from_config(&config)?);
        let probe = Arc::new(TcpReachability::new(
            config.reachability_target()?,
            config.reachability_timeout(),
        ));

        Ok(Self::with_emitter(config, db, api, probe, emitter))
    }

    /// Returns the current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.core.status.read().await.clone()
    }

    pub fn orders(&self) -> Arc<OrderService> {
        self.orders.clone()
    }

    pub fn refresher(&self) -> Arc<CacheRefresher> {
        self.refresher.clone()
    }

    pub fn engine(&self) -> Arc<SyncEngine> {
        self.core.engine.clone()
    }

    pub fn connectivity(&self) -> Arc<ConnectivityMonitor> {
        self.core.connectivity.clone()
    }

    /// Starts the sync agent.
    ///
    /// Seeds connectivity from the probe (draining the queue if online),
    /// then spawns the reachability watcher and, if enabled, the retry task.
    pub async fn start(&mut self) -> SyncResult<()> {
        if !self.tasks.is_empty() {
            warn!("Sync agent already started");
            return Ok(());
        }

        info!(
            device_id = %self.config.device_id(),
            server = %self.config.server.base_url,
            "Starting sync agent"
        );

        let online = self.probe.is_reachable().await;
        self.core.on_reachability_change(online).await?;
        self.core.publish_pending().await;

        let (watch_tx, watch_rx) = mpsc::channel(1);
        self.shutdown_txs.push(watch_tx);
        self.tasks.push(tokio::spawn(Self::reachability_watcher(
            self.core.clone(),
            self.probe.clone(),
            self.config.reachability_poll_interval(),
            watch_rx,
        )));

        if self.config.sync.retry_enabled {
            let (retry_tx, retry_rx) = mpsc::channel(1);
            self.shutdown_txs.push(retry_tx);
            self.tasks.push(tokio::spawn(Self::retry_loop(
                self.core.clone(),
                self.config.clone(),
                retry_rx,
            )));
        }

        info!(online, "Sync agent started");
        Ok(())
    }

    /// Feeds a reachability reading in from outside (e.g. a platform
    /// network-change callback).
    pub async fn on_reachability_change(&self, online: bool) -> SyncResult<Transition> {
        self.core.on_reachability_change(online).await
    }

    /// Submits an order and refreshes the pending count.
    pub async fn submit_order(&self, draft: OrderDraft) -> SubmitOutcome {
        let outcome = self.orders.submit_order(draft).await;
        if outcome.is_offline() {
            self.core.publish_pending().await;
        }
        outcome
    }

    /// Refreshes reference data and records the server's health.
    pub async fn refresh(&self, include_secondary: bool) -> SyncResult<RefreshOutcome> {
        let outcome = self.refresher.refresh(include_secondary).await?;

        {
            let mut s = self.core.status.write().await;
            match &outcome {
                RefreshOutcome::ServerUnreachable { reason } => {
                    s.server_healthy = false;
                    s.last_error = Some(reason.clone());
                }
                RefreshOutcome::Fresh { sync, .. } => {
                    s.server_healthy = true;
                    if sync.synced > 0 {
                        s.last_sync = Some(Utc::now());
                    }
                }
                RefreshOutcome::Cached(_) => {}
            }
        }

        if let RefreshOutcome::ServerUnreachable { reason } = &outcome {
            self.core.emitter.emit_error(reason, true);
        }
        self.core.publish_pending().await;

        Ok(outcome)
    }

    /// Stops the sync agent gracefully.
    pub async fn shutdown(&mut self) -> SyncResult<()> {
        info!("Shutting down sync agent");

        for tx in self.shutdown_txs.drain(..) {
            let _ = tx.send(()).await;
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        info!("Sync agent stopped");
        Ok(())
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    async fn reachability_watcher(
        core: Arc<AgentCore>,
        probe: Arc<dyn ReachabilityProbe>,
        poll_interval: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; start() already probed.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let online = probe.is_reachable().await;
                    if let Err(e) = core.on_reachability_change(online).await {
                        error!(error = %e, "Reconnect handling failed");
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Reachability watcher received shutdown");
                    break;
                }
            }
        }

        info!("Reachability watcher stopped");
    }

    /// Re-attempts a blocked queue with exponential backoff.
    async fn retry_loop(
        core: Arc<AgentCore>,
        config: Arc<SyncConfig>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let max_backoff = Duration::from_secs(config.sync.max_backoff_secs);
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(config.sync.initial_backoff_ms),
            max_interval: max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        let idle = config.reachability_poll_interval();
        let mut delay = idle;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}

                _ = shutdown_rx.recv() => {
                    info!("Retry task received shutdown");
                    break;
                }
            }

            if !core.connectivity.is_online() {
                backoff.reset();
                delay = idle;
                continue;
            }

            let result = core.drain().await;
            if !matches!(&result, Ok(report) if report.attempted == 0) {
                core.publish_status().await;
            }

            delay = match result {
                Ok(report) if report.halted.is_some() => {
                    let next = backoff.next_backoff().unwrap_or(max_backoff);
                    debug!(?next, remaining = report.remaining, "Queue still blocked; backing off");
                    next
                }
                Ok(_) => {
                    backoff.reset();
                    idle
                }
                Err(_) => backoff.next_backoff().unwrap_or(max_backoff),
            };
        }

        info!("Retry task stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{unavailable, FakeServer, StaticProbe};
    use meridian_core::{Money, OrderLine, PaymentMethod, SyncOperation};
    use meridian_db::DbConfig;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        statuses: Mutex<Vec<SyncStatus>>,
        errors: Mutex<Vec<(String, bool)>>,
    }

    impl SyncEventEmitter for RecordingEmitter {
        fn emit_status(&self, status: &SyncStatus) {
            self.statuses.lock().unwrap().push(status.clone());
        }
        fn emit_progress(&self, _pending: u64, _synced: usize) {}
        fn emit_error(&self, message: &str, retryable: bool) {
            self.errors.lock().unwrap().push((message.to_string(), retryable));
        }
    }

    fn test_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.sync.reachability_poll_secs = 1;
        config.sync.initial_backoff_ms = 10;
        config.sync.max_backoff_secs = 1;
        config
    }

    fn order(branch_id: i64) -> OrderDraft {
        OrderDraft::from_lines(
            branch_id,
            vec![OrderLine::new(1, Decimal::ONE, Money::from_minor(1000), Money::zero())],
            Decimal::ZERO,
            PaymentMethod::Cash,
            None,
        )
    }

    struct Fixture {
        db: Database,
        server: Arc<FakeServer>,
        probe: Arc<StaticProbe>,
        emitter: Arc<RecordingEmitter>,
        agent: SyncAgent,
    }

    async fn fixture(config: SyncConfig, reachable: bool) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let server = Arc::new(FakeServer::new());
        let probe = Arc::new(StaticProbe::new(reachable));
        let emitter = Arc::new(RecordingEmitter::default());
        let agent = SyncAgent::with_emitter(
            config,
            db.clone(),
            server.clone(),
            probe.clone(),
            emitter.clone(),
        );
        Fixture {
            db,
            server,
            probe,
            emitter,
            agent,
        }
    }

    #[test]
    fn test_sync_status_default() {
        let status = SyncStatus::default();
        assert!(!status.online);
        assert!(status.server_healthy);
        assert_eq!(status.pending_count, 0);
    }

    #[tokio::test]
    async fn test_reconnect_drains_queue_in_one_pass() {
        let f = fixture(test_config(), false).await;

        let mut queued = Vec::new();
        for branch in 1..=3 {
            let outcome = f.agent.submit_order(order(branch)).await;
            assert!(outcome.is_offline());
            queued.push(branch);
        }
        assert_eq!(f.agent.status().await.pending_count, 3);
        assert!(f.server.calls().is_empty());

        let transition = f.agent.on_reachability_change(true).await.unwrap();
        assert_eq!(transition, Transition::CameOnline);

        let replayed: Vec<i64> = f
            .server
            .submitted()
            .iter()
            .map(|op| match op {
                SyncOperation::Order(draft) => draft.branch_id,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(replayed, queued);
        assert_eq!(f.server.calls().len(), 3);

        let status = f.agent.status().await;
        assert!(status.online);
        assert_eq!(status.pending_count, 0);
        assert!(status.last_sync.is_some());
        assert_eq!(f.db.sync_queue().count().await.unwrap(), 0);

        let last = f.emitter.statuses.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.pending_count, 0);
    }

    #[tokio::test]
    async fn test_going_offline_only_flips_state() {
        let f = fixture(test_config(), false).await;
        f.agent.on_reachability_change(true).await.unwrap();
        f.server.clear_calls();

        assert_eq!(
            f.agent.on_reachability_change(false).await.unwrap(),
            Transition::WentOffline
        );
        assert_eq!(
            f.agent.on_reachability_change(false).await.unwrap(),
            Transition::Unchanged
        );
        assert!(!f.agent.status().await.online);
        assert!(f.server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_online_reading_does_not_drain_again() {
        let f = fixture(test_config(), false).await;
        f.agent.on_reachability_change(true).await.unwrap();

        f.db
            .sync_queue()
            .enqueue(&SyncOperation::from(order(1)))
            .await
            .unwrap();

        assert_eq!(
            f.agent.on_reachability_change(true).await.unwrap(),
            Transition::Unchanged
        );
        assert!(f.server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_runs_startup_drain() {
        let mut config = test_config();
        config.sync.retry_enabled = false;
        let mut f = fixture(config, true).await;
        f.db
            .sync_queue()
            .enqueue(&SyncOperation::from(order(1)))
            .await
            .unwrap();

        f.agent.start().await.unwrap();

        assert_eq!(f.server.submitted().len(), 1);
        let status = f.agent.status().await;
        assert!(status.online);
        assert_eq!(status.pending_count, 0);

        f.agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_task_unblocks_queue() {
        let mut f = fixture(test_config(), true).await;
        for branch in 1..=2 {
            f.db
                .sync_queue()
                .enqueue(&SyncOperation::from(order(branch)))
                .await
                .unwrap();
        }
        f.server.script_submit(Err(unavailable()));

        f.agent.start().await.unwrap();
        assert_eq!(f.agent.status().await.pending_count, 2);
        assert!(!f.emitter.errors.lock().unwrap().is_empty());

        tokio::time::timeout(Duration::from_secs(10), async {
            while f.db.sync_queue().count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("retry task should drain the queue");

        assert_eq!(f.server.submitted().len(), 2);
        f.agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_watcher_feeds_transitions() {
        let mut config = test_config();
        config.sync.retry_enabled = false;
        let mut f = fixture(config, false).await;
        f.agent.submit_order(order(1)).await;

        f.agent.start().await.unwrap();
        assert!(!f.agent.status().await.online);

        f.probe.set(true);
        tokio::time::timeout(Duration::from_secs(10), async {
            while !f.agent.status().await.online || f.agent.status().await.pending_count > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("watcher should notice the network");

        assert_eq!(f.server.submitted().len(), 1);
        f.agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_marks_server_unhealthy() {
        let f = fixture(test_config(), false).await;
        f.agent.on_reachability_change(true).await.unwrap();
        f.server.set_healthy(false);

        let outcome = f.agent.refresh(false).await.unwrap();
        assert!(outcome.is_server_unreachable());

        let status = f.agent.status().await;
        assert!(status.online);
        assert!(!status.server_healthy);

        f.server.set_healthy(true);
        f.agent.refresh(false).await.unwrap();
        assert!(f.agent.status().await.server_healthy);
    }

    #[tokio::test]
    async fn test_from_config_with_emitter_reports_offline_start() {
        let mut config = test_config();
        // Nothing listens on the discard port in test environments.
        config.server.base_url = "http://127.0.0.1:9".into();
        config.sync.retry_enabled = false;

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let emitter = Arc::new(RecordingEmitter::default());
        let mut agent =
            SyncAgent::from_config_with_emitter(config, db, emitter.clone()).unwrap();
        agent.start().await.unwrap();

        let last = emitter.statuses.lock().unwrap().last().cloned().unwrap();
        assert!(!last.online);
        assert_eq!(last.pending_count, 0);

        agent.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_server_url() {
        let mut config = test_config();
        config.server.base_url = "not a url".into();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(SyncAgent::from_config(config, db).is_err());
    }
}
