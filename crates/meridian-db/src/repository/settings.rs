//! # Settings Repository
//!
//! Small JSON values the register keeps between runs: the receipt settings
//! pulled during a full refresh and the branch the register last worked in.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::ReceiptSettings;

/// Key for the cached [`ReceiptSettings`].
pub const RECEIPT_SETTINGS_KEY: &str = "receipt_settings";

/// Key for the branch whose products are mirrored.
pub const ACTIVE_BRANCH_KEY: &str = "active_branch_id";

/// Repository for `app_settings`.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Reads and decodes a setting.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match value {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encodes and upserts a setting.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        let raw = serde_json::to_string(value)?;

        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(key, "Setting stored");
        Ok(())
    }

    pub async fn receipt_settings(&self) -> DbResult<Option<ReceiptSettings>> {
        self.get_json(RECEIPT_SETTINGS_KEY).await
    }

    pub async fn set_receipt_settings(&self, settings: &ReceiptSettings) -> DbResult<()> {
        self.put_json(RECEIPT_SETTINGS_KEY, settings).await
    }

    pub async fn active_branch_id(&self) -> DbResult<Option<i64>> {
        self.get_json(ACTIVE_BRANCH_KEY).await
    }

    pub async fn set_active_branch_id(&self, branch_id: i64) -> DbResult<()> {
        self.put_json(ACTIVE_BRANCH_KEY, &branch_id).await
    }
}
