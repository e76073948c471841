//! In-process [`ServerApi`] that records every call.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{endpoint, LoyaltyCredit, ServerApi, WriteAck};
use crate::connectivity::ReachabilityProbe;
use crate::error::{SyncError, SyncResult};
use meridian_core::{Branch, Category, Product, ReceiptSettings, SyncOperation, User};

pub(crate) struct FakeServer {
    healthy: AtomicBool,
    products_fail: AtomicBool,
    next_id: AtomicI64,
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<SyncOperation>>,
    submit_script: Mutex<VecDeque<SyncResult<WriteAck>>>,
    submit_delay: Mutex<Option<Duration>>,
    pub branches: Mutex<Vec<Branch>>,
    pub categories: Mutex<Vec<Category>>,
    pub users: Mutex<Vec<User>>,
    pub products: Mutex<Vec<Product>>,
    pub receipt: Mutex<Option<ReceiptSettings>>,
    pub loyalty_balance: Mutex<Option<i64>>,
}

impl FakeServer {
    pub fn new() -> Self {
        FakeServer {
            healthy: AtomicBool::new(true),
            products_fail: AtomicBool::new(false),
            next_id: AtomicI64::new(100),
            calls: Mutex::default(),
            submitted: Mutex::default(),
            submit_script: Mutex::default(),
            submit_delay: Mutex::default(),
            branches: Mutex::default(),
            categories: Mutex::default(),
            users: Mutex::default(),
            products: Mutex::default(),
            receipt: Mutex::default(),
            loyalty_balance: Mutex::default(),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn fail_products(&self, fail: bool) {
        self.products_fail.store(fail, Ordering::SeqCst);
    }

    /// Queues the outcome of an upcoming `submit`. Unscripted submits succeed.
    pub fn script_submit(&self, result: SyncResult<WriteAck>) {
        self.submit_script.lock().unwrap().push_back(result);
    }

    pub fn delay_submits(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Operations the server accepted, in arrival order.
    pub fn submitted(&self) -> Vec<SyncOperation> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub(crate) fn unavailable() -> SyncError {
    SyncError::ServerError {
        status: 503,
        message: "unavailable".into(),
    }
}

#[async_trait]
impl ServerApi for FakeServer {
    async fn health(&self) -> SyncResult<()> {
        self.record("health");
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(unavailable())
        }
    }

    async fn submit(&self, operation: &SyncOperation) -> SyncResult<WriteAck> {
        self.record(format!("POST {}", endpoint(operation.kind())));

        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.submit_script.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| {
            Ok(WriteAck {
                id: Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
            })
        });

        if result.is_ok() {
            self.submitted.lock().unwrap().push(operation.clone());
        }
        result
    }

    async fn branches(&self) -> SyncResult<Vec<Branch>> {
        self.record("GET /api/branches");
        Ok(self.branches.lock().unwrap().clone())
    }

    async fn categories(&self) -> SyncResult<Vec<Category>> {
        self.record("GET /api/categories");
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn users(&self) -> SyncResult<Vec<User>> {
        self.record("GET /api/users");
        Ok(self.users.lock().unwrap().clone())
    }

    async fn products(&self, branch_id: i64) -> SyncResult<Vec<Product>> {
        self.record(format!("GET /api/products?branch_id={branch_id}"));
        if self.products_fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.products.lock().unwrap().clone())
    }

    async fn add_loyalty_points(&self, credit: &LoyaltyCredit) -> SyncResult<i64> {
        self.record("POST /api/loyalty/add-points");
        let mut balance = self.loyalty_balance.lock().unwrap();
        match balance.as_mut() {
            Some(points) => {
                *points += credit.points_to_add;
                Ok(*points)
            }
            None => Err(SyncError::Rejected {
                status: 400,
                message: "Customer not found".into(),
            }),
        }
    }

    async fn receipt_settings(&self) -> SyncResult<ReceiptSettings> {
        self.record("GET /api/receipt-settings");
        self.receipt
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::Unsuccessful("no settings".into()))
    }
}

/// Reachability that reports whatever the test last set.
pub(crate) struct StaticProbe(AtomicBool);

impl StaticProbe {
    pub fn new(reachable: bool) -> Self {
        StaticProbe(AtomicBool::new(reachable))
    }

    pub fn set(&self, reachable: bool) {
        self.0.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
