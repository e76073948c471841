//! # Store Server Client
//!
//! The register's REST conversation with the authoritative store server.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Store Server REST API                            │
//! │                                                                         │
//! │  Writes (queued when offline)                                          │
//! │  ─────────────────────────────                                         │
//! │  POST /api/orders        → { success, orderId }                        │
//! │  POST /api/waste         → { success }                                 │
//! │  POST /api/purchases     → { success, invoiceId }                      │
//! │  POST /api/transfers     → { success }                                 │
//! │                                                                         │
//! │  Reads (mirrored locally)                                              │
//! │  ─────────────────────────                                             │
//! │  GET  /api/health                 → { status: "ok", timestamp }        │
//! │  GET  /api/branches               → [Branch]                           │
//! │  GET  /api/categories             → [Category]                         │
//! │  GET  /api/users                  → [User]                             │
//! │  GET  /api/products?branch_id=N   → [Product]                          │
//! │  GET  /api/receipt-settings       → { success, settings }              │
//! │                                                                         │
//! │  Online only                                                           │
//! │  ───────────                                                           │
//! │  POST /api/loyalty/add-points     → { success, new_points }            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Classification
//! - 2xx with a JSON body → parsed
//! - 2xx with anything else → [`SyncError::InvalidResponse`]
//! - 2xx with `success: false` → [`SyncError::Unsuccessful`]
//! - 4xx (except 408/429) → [`SyncError::Rejected`]
//! - 5xx, 408, 429 → [`SyncError::ServerError`]
//! - no answer within the timeout → [`SyncError::Timeout`]

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use meridian_core::{Branch, Category, OperationKind, Product, ReceiptSettings, SyncOperation, User};

// =============================================================================
// Wire Types
// =============================================================================

/// Server acknowledgement of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    /// The committed record's id (`orderId`, `invoiceId`), if the endpoint
    /// returns one.
    pub id: Option<i64>,
}

/// Body of `POST /api/loyalty/add-points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoyaltyCredit {
    pub customer_id: i64,
    pub points_to_add: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    success: bool,
    #[serde(default, alias = "orderId", alias = "invoiceId")]
    id: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct LoyaltyResponse {
    success: bool,
    #[serde(default)]
    new_points: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptSettingsResponse {
    success: bool,
    #[serde(default)]
    settings: Option<ReceiptSettings>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Endpoint a queued operation replays against.
pub fn endpoint(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Order => "/api/orders",
        OperationKind::Waste => "/api/waste",
        OperationKind::Purchase => "/api/purchases",
        OperationKind::Transfer => "/api/transfers",
    }
}

// =============================================================================
// Server Api Trait
// =============================================================================

/// Everything the register asks of the store server.
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// `GET /api/health`. Any error means the server is unusable.
    async fn health(&self) -> SyncResult<()>;

    /// Sends a write to its endpoint with the exact body that would be queued.
    async fn submit(&self, operation: &SyncOperation) -> SyncResult<WriteAck>;

    async fn branches(&self) -> SyncResult<Vec<Branch>>;

    async fn categories(&self) -> SyncResult<Vec<Category>>;

    async fn users(&self) -> SyncResult<Vec<User>>;

    /// Products with the given branch's stock levels.
    async fn products(&self, branch_id: i64) -> SyncResult<Vec<Product>>;

    /// Credits points and returns the customer's new balance.
    async fn add_loyalty_points(&self, credit: &LoyaltyCredit) -> SyncResult<i64>;

    async fn receipt_settings(&self) -> SyncResult<ReceiptSettings>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// [`ServerApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpServerApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpServerApi {
    /// Creates a client for `base_url` with a fixed per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        Url::parse(base_url)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(HttpServerApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.server.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> SyncResult<T> {
        let resp = self
            .client
            .get(self.url(path))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        self.handle_response(path, resp).await
    }

    async fn post_raw<T: DeserializeOwned>(&self, path: &str, body: String) -> SyncResult<T> {
        let resp = self
            .client
            .post(self.url(path))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        self.handle_response(path, resp).await
    }

    fn transport_error(&self, path: &str, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(format!("{path} after {} seconds", self.timeout.as_secs()))
        } else {
            SyncError::from(err)
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        path: &str,
        resp: reqwest::Response,
    ) -> SyncResult<T> {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = resp.bytes().await.map_err(|e| self.transport_error(path, e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown status")
                        .to_string()
                });
            warn!(path, status = status.as_u16(), %message, "Server returned an error");
            return Err(SyncError::from_status(status.as_u16(), message));
        }

        if !content_type.contains("application/json") {
            return Err(SyncError::InvalidResponse(format!(
                "{path} returned '{content_type}' instead of application/json"
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|e| SyncError::InvalidResponse(format!("{path}: {e}")))
    }
}

#[async_trait]
impl ServerApi for HttpServerApi {
    async fn health(&self) -> SyncResult<()> {
        let health: HealthResponse = self.get("/api/health").await?;
        if health.status != "ok" {
            return Err(SyncError::Unsuccessful(format!(
                "health status is '{}'",
                health.status
            )));
        }
        Ok(())
    }

    async fn submit(&self, operation: &SyncOperation) -> SyncResult<WriteAck> {
        let path = endpoint(operation.kind());
        let body = operation.payload_json()?;

        let response: WriteResponse = self.post_raw(path, body).await?;
        if !response.success {
            return Err(SyncError::Unsuccessful(
                response.error.unwrap_or_else(|| format!("{path} reported success: false")),
            ));
        }

        debug!(path, id = ?response.id, "Write acknowledged");
        Ok(WriteAck { id: response.id })
    }

    async fn branches(&self) -> SyncResult<Vec<Branch>> {
        self.get("/api/branches").await
    }

    async fn categories(&self) -> SyncResult<Vec<Category>> {
        self.get("/api/categories").await
    }

    async fn users(&self) -> SyncResult<Vec<User>> {
        self.get("/api/users").await
    }

    async fn products(&self, branch_id: i64) -> SyncResult<Vec<Product>> {
        self.get(&format!("/api/products?branch_id={branch_id}")).await
    }

    async fn add_loyalty_points(&self, credit: &LoyaltyCredit) -> SyncResult<i64> {
        let body = serde_json::to_string(credit)?;
        let response: LoyaltyResponse = self.post_raw("/api/loyalty/add-points", body).await?;

        match (response.success, response.new_points) {
            (true, Some(points)) => Ok(points),
            (true, None) => Err(SyncError::InvalidResponse(
                "loyalty response is missing new_points".into(),
            )),
            (false, _) => Err(SyncError::Unsuccessful(
                response.error.unwrap_or_else(|| "points were not added".into()),
            )),
        }
    }

    async fn receipt_settings(&self) -> SyncResult<ReceiptSettings> {
        let response: ReceiptSettingsResponse = self.get("/api/receipt-settings").await?;

        match (response.success, response.settings) {
            (true, Some(settings)) => Ok(settings),
            (true, None) => Err(SyncError::InvalidResponse(
                "receipt settings response is missing settings".into(),
            )),
            (false, _) => Err(SyncError::Unsuccessful(
                response.error.unwrap_or_else(|| "receipt settings unavailable".into()),
            )),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use meridian_core::{Money, OrderDraft, OrderLine, PaymentMethod, WasteRecord};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn api(base_url: &str) -> HttpServerApi {
        HttpServerApi::new(base_url, Duration::from_secs(5)).unwrap()
    }

    fn order() -> SyncOperation {
        SyncOperation::from(OrderDraft::from_lines(
            1,
            vec![OrderLine::new(7, Decimal::new(2, 0), Money::from_minor(1000), Money::from_minor(600))],
            Decimal::ZERO,
            PaymentMethod::Cash,
            None,
        ))
    }

    #[tokio::test]
    async fn test_submit_order_sends_payload_verbatim() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/api/orders",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(body);
                    Json(json!({ "success": true, "orderId": 41 }))
                }
            }),
        );
        let base = serve(app).await;

        let op = order();
        let ack = api(&base).submit(&op).await.unwrap();
        assert_eq!(ack.id, Some(41));

        let expected: Value = serde_json::from_str(&op.payload_json().unwrap()).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[expected]);
    }

    #[tokio::test]
    async fn test_write_endpoints_by_kind() {
        let app = Router::new()
            .route("/api/waste", post(|| async { Json(json!({ "success": true })) }))
            .route(
                "/api/purchases",
                post(|| async { Json(json!({ "success": true, "invoiceId": 9 })) }),
            );
        let base = serve(app).await;
        let api = api(&base);

        let waste = SyncOperation::from(WasteRecord::new(1, 2, Decimal::ONE, "dropped"));
        assert_eq!(api.submit(&waste).await.unwrap(), WriteAck { id: None });

        let purchase = SyncOperation::from(meridian_core::PurchaseInvoice::new(
            1,
            3,
            vec![meridian_core::PurchaseLine {
                product_id: 2,
                quantity: Decimal::TEN,
                cost_price: Money::from_minor(250),
            }],
        ));
        assert_eq!(api.submit(&purchase).await.unwrap().id, Some(9));

        let transfer = SyncOperation::from(meridian_core::StockTransfer::new(1, 2, 3, Decimal::ONE));
        let err = api.submit(&transfer).await.unwrap_err();
        assert!(err.is_rejection(), "unknown route is a 404: {err}");
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let app = Router::new()
            .route(
                "/api/orders",
                post(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "success": false, "error": "database is locked" })),
                    )
                }),
            )
            .route(
                "/api/transfers",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "success": false, "error": "Insufficient stock" })),
                    )
                }),
            )
            .route(
                "/api/waste",
                post(|| async { Json(json!({ "success": false, "error": "busy" })) }),
            );
        let base = serve(app).await;
        let api = api(&base);

        let err = api.submit(&order()).await.unwrap_err();
        assert!(matches!(err, SyncError::ServerError { status: 500, .. }));
        assert!(err.to_string().contains("database is locked"));
        assert!(err.is_retryable());

        let transfer = SyncOperation::from(meridian_core::StockTransfer::new(1, 2, 3, Decimal::ONE));
        let err = api.submit(&transfer).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 400, .. }));
        assert!(err.to_string().contains("Insufficient stock"));

        let waste = SyncOperation::from(WasteRecord::new(1, 2, Decimal::ONE, "dropped"));
        let err = api.submit(&waste).await.unwrap_err();
        assert!(matches!(err, SyncError::Unsuccessful(_)));
    }

    #[tokio::test]
    async fn test_non_json_response_is_malformed() {
        let app = Router::new()
            .route("/api/health", get(|| async { "<!doctype html><html></html>" }));
        let base = serve(app).await;

        let err = api(&base).health().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_health() {
        let app = Router::new().route(
            "/api/health",
            get(|| async { Json(json!({ "status": "ok", "timestamp": "2026-10-18T09:00:00Z" })) }),
        );
        let base = serve(app).await;
        api(&base).health().await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout() {
        let app = Router::new().route(
            "/api/health",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "status": "ok" }))
            }),
        );
        let base = serve(app).await;

        let api = HttpServerApi::new(&base, Duration::from_millis(200)).unwrap();
        let err = api.health().await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = api(&format!("http://{addr}")).health().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.is_rejection());
    }

    #[tokio::test]
    async fn test_reference_reads() {
        let app = Router::new()
            .route(
                "/api/branches",
                get(|| async { Json(json!([{ "id": 1, "name": "Malqa", "location": "North" }])) }),
            )
            .route(
                "/api/products",
                get(|axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>| async move {
                    match q.get("branch_id") {
                        Some(branch) => (
                            StatusCode::OK,
                            Json(json!([{
                                "id": 5,
                                "category_id": 1,
                                "name": format!("Apples @{branch}"),
                                "price": 7.25,
                                "cost_price": 5,
                                "unit": "kg",
                                "barcode": "42",
                                "stock_quantity": 3.5,
                                "low_stock_threshold": 1
                            }])),
                        ),
                        None => (
                            StatusCode::BAD_REQUEST,
                            Json(json!({ "error": "Branch ID is required" })),
                        ),
                    }
                }),
            )
            .route(
                "/api/receipt-settings",
                get(|| async {
                    Json(json!({ "success": true, "settings": { "store_name": "Meridian Market" } }))
                }),
            );
        let base = serve(app).await;
        let api = api(&base);

        let branches = api.branches().await.unwrap();
        assert_eq!(branches[0].name, "Malqa");

        let products = api.products(2).await.unwrap();
        assert_eq!(products[0].name, "Apples @2");
        assert_eq!(products[0].price.as_decimal(), Decimal::new(725, 2));

        let settings = api.receipt_settings().await.unwrap();
        assert_eq!(settings.store_name, "Meridian Market");

        assert!(api.users().await.unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn test_add_loyalty_points() {
        let app = Router::new().route(
            "/api/loyalty/add-points",
            post(|Json(body): Json<Value>| async move {
                let added = body["points_to_add"].as_i64().unwrap_or(0);
                Json(json!({ "success": true, "new_points": 150 + added }))
            }),
        );
        let base = serve(app).await;

        let new_points = api(&base)
            .add_loyalty_points(&LoyaltyCredit {
                customer_id: 3,
                points_to_add: 2,
                order_id: Some(41),
            })
            .await
            .unwrap();
        assert_eq!(new_points, 152);
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpServerApi::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(err.is_config_error());
    }
}
