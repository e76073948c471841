//! # Repository Module
//!
//! Repository implementations for the local store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Local Store Repositories                             │
//! │                                                                         │
//! │  OrderService / SyncEngine / CacheRefresher                            │
//! │       │                                                                 │
//! │       │  db.sync_queue().enqueue(&op)                                  │
//! │       ▼                                                                 │
//! │  SyncQueueRepository     enqueue, pending, head, remove, count         │
//! │  ReferenceRepository     replace_*, branches, products, lookup_scan    │
//! │  SettingsRepository      get_json/put_json, receipt settings           │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SyncQueueRepository`](sync_queue::SyncQueueRepository) - Durable FIFO of pending writes
//! - [`ReferenceRepository`](reference::ReferenceRepository) - Server reference data mirrors
//! - [`SettingsRepository`](settings::SettingsRepository) - Cached settings

pub mod reference;
pub mod settings;
pub mod sync_queue;
