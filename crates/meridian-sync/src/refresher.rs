//! # Reference Data Cache Refresher
//!
//! Keeps the local mirrors of branches, categories, users and products in
//! step with the server, and serves them from disk while offline.
//!
//! ## Online Refresh
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refresh(include_secondary)                                             │
//! │                                                                         │
//! │  1. GET /api/health ──fail──► ServerUnreachable  (no drain, no pull)   │
//! │  2. drain sync queue          stock on the server reflects queued      │
//! │                               sales before we pull it                  │
//! │  3. GET branches, categories, users                                    │
//! │  4. resolve branch: requested → last used → configured → first         │
//! │  5. GET /api/products?branch_id=N                                      │
//! │  6. GET /api/receipt-settings            (include_secondary only)      │
//! │  7. replace each mirror that pulled successfully                       │
//! │  8. read the snapshot back from the mirror                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A collection whose pull fails keeps its previous mirror contents.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::ServerApi;
use crate::connectivity::ConnectivityMonitor;
use crate::engine::{SyncEngine, SyncReport};
use crate::error::SyncResult;
use meridian_core::{Branch, Category, Product, ReceiptSettings, User};
use meridian_db::Database;

/// Reference data as served to the register UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshSnapshot {
    pub branches: Vec<Branch>,
    pub categories: Vec<Category>,
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub active_branch_id: Option<i64>,
    pub receipt_settings: Option<ReceiptSettings>,
}

impl RefreshSnapshot {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// What a refresh produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Offline: served from the local mirror.
    Cached(RefreshSnapshot),
    /// Online: pulled, mirrored and read back.
    Fresh {
        snapshot: RefreshSnapshot,
        sync: SyncReport,
    },
    /// The network is up but the server failed its health probe.
    ServerUnreachable { reason: String },
}

impl RefreshOutcome {
    pub fn snapshot(&self) -> Option<&RefreshSnapshot> {
        match self {
            RefreshOutcome::Cached(snapshot) | RefreshOutcome::Fresh { snapshot, .. } => {
                Some(snapshot)
            }
            RefreshOutcome::ServerUnreachable { .. } => None,
        }
    }

    pub fn is_server_unreachable(&self) -> bool {
        matches!(self, RefreshOutcome::ServerUnreachable { .. })
    }
}

/// Pulls reference data into the local mirror.
pub struct CacheRefresher {
    db: Database,
    api: Arc<dyn ServerApi>,
    connectivity: Arc<ConnectivityMonitor>,
    engine: Arc<SyncEngine>,
    default_branch_id: Option<i64>,
}

impl CacheRefresher {
    pub fn new(
        db: Database,
        api: Arc<dyn ServerApi>,
        connectivity: Arc<ConnectivityMonitor>,
        engine: Arc<SyncEngine>,
    ) -> Self {
        CacheRefresher {
            db,
            api,
            connectivity,
            engine,
            default_branch_id: None,
        }
    }

    /// Branch to mirror when none has been used before.
    pub fn with_default_branch(mut self, branch_id: Option<i64>) -> Self {
        self.default_branch_id = branch_id;
        self
    }

    /// Refreshes reference data for the current branch.
    pub async fn refresh(&self, include_secondary: bool) -> SyncResult<RefreshOutcome> {
        self.refresh_inner(None, include_secondary).await
    }

    /// Refreshes reference data and switches the product mirror to
    /// `branch_id`.
    pub async fn refresh_for_branch(
        &self,
        branch_id: i64,
        include_secondary: bool,
    ) -> SyncResult<RefreshOutcome> {
        self.refresh_inner(Some(branch_id), include_secondary).await
    }

    async fn refresh_inner(
        &self,
        requested_branch: Option<i64>,
        include_secondary: bool,
    ) -> SyncResult<RefreshOutcome> {
        if !self.connectivity.is_online() {
            debug!("Offline; serving reference data from the mirror");
            return Ok(RefreshOutcome::Cached(self.snapshot(include_secondary).await?));
        }

        if let Err(e) = self.api.health().await {
            warn!(error = %e, "Server failed its health probe");
            return Ok(RefreshOutcome::ServerUnreachable {
                reason: e.to_string(),
            });
        }

        let sync = self.engine.sync_pending().await?;

        let reference = self.db.reference();
        let settings = self.db.settings();

        let branches = match self.api.branches().await {
            Ok(branches) => {
                reference.replace_branches(&branches).await?;
                branches
            }
            Err(e) => {
                warn!(error = %e, "Branch pull failed; keeping mirror");
                reference.branches().await?
            }
        };

        match self.api.categories().await {
            Ok(categories) => reference.replace_categories(&categories).await?,
            Err(e) => warn!(error = %e, "Category pull failed; keeping mirror"),
        }

        match self.api.users().await {
            Ok(users) => reference.replace_users(&users).await?,
            Err(e) => warn!(error = %e, "User pull failed; keeping mirror"),
        }

        let branch_id = match requested_branch {
            Some(id) => Some(id),
            None => settings.active_branch_id().await?,
        }
        .or(self.default_branch_id)
        .or_else(|| branches.first().map(|b| b.id));

        if let Some(branch_id) = branch_id {
            match self.api.products(branch_id).await {
                Ok(products) => {
                    reference.replace_products(&products).await?;
                    settings.set_active_branch_id(branch_id).await?;
                }
                Err(e) => warn!(branch_id, error = %e, "Product pull failed; keeping mirror"),
            }
        } else {
            debug!("No branch known yet; skipping product pull");
        }

        if include_secondary {
            match self.api.receipt_settings().await {
                Ok(receipt) => settings.set_receipt_settings(&receipt).await?,
                Err(e) => warn!(error = %e, "Receipt settings pull failed; keeping cache"),
            }
        }

        let snapshot = self.snapshot(include_secondary).await?;
        info!(
            branches = snapshot.branches.len(),
            products = snapshot.products.len(),
            synced = sync.synced,
            "Reference data refreshed"
        );

        Ok(RefreshOutcome::Fresh { snapshot, sync })
    }

    /// Reads the mirror. An empty branch mirror means nothing has ever been
    /// pulled, so nothing is served.
    pub async fn snapshot(&self, include_secondary: bool) -> SyncResult<RefreshSnapshot> {
        let reference = self.db.reference();
        if reference.is_empty().await? {
            return Ok(RefreshSnapshot::default());
        }

        let settings = self.db.settings();
        let receipt_settings = if include_secondary {
            settings.receipt_settings().await?
        } else {
            None
        };

        Ok(RefreshSnapshot {
            branches: reference.branches().await?,
            categories: reference.categories().await?,
            users: reference.users().await?,
            products: reference.products().await?,
            active_branch_id: settings.active_branch_id().await?,
            receipt_settings,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
