//! # Reference Data Repository
//!
//! Local mirrors of the server's branches, categories, products and users,
//! so the register can sell and log in while offline.
//!
//! ## Wholesale Replacement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  replace_products([..7 rows..])                                         │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    DELETE FROM products          ← 10 stale rows gone                  │
//! │    INSERT INTO products × 7      ← exactly what the server sent        │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Readers see either the old 10 or the new 7, never a mix.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each row keeps its lookup columns (`id`, `category_id`, `barcode`) next to
//! the full server record as JSON.

use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Branch, Category, Product, ScanInput, ScanMatch, User};

/// Repository for mirrored reference data.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    /// Creates a new ReferenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    // =========================================================================
    // Replacement
    // =========================================================================

    /// Replaces the branch mirror with `branches`.
    pub async fn replace_branches(&self, branches: &[Branch]) -> DbResult<()> {
        let rows = branches
            .iter()
            .map(|b| Ok((b.id, b.name.clone(), serde_json::to_string(b)?)))
            .collect::<DbResult<Vec<_>>>()?;
        self.replace_named("branches", rows).await
    }

    /// Replaces the category mirror with `categories`.
    pub async fn replace_categories(&self, categories: &[Category]) -> DbResult<()> {
        let rows = categories
            .iter()
            .map(|c| Ok((c.id, c.name.clone(), serde_json::to_string(c)?)))
            .collect::<DbResult<Vec<_>>>()?;
        self.replace_named("categories", rows).await
    }

    /// Replaces the user mirror with `users`.
    pub async fn replace_users(&self, users: &[User]) -> DbResult<()> {
        let rows = users
            .iter()
            .map(|u| Ok((u.id, u.name.clone(), serde_json::to_string(u)?)))
            .collect::<DbResult<Vec<_>>>()?;
        self.replace_named("users", rows).await
    }

    /// Replaces the product mirror with `products`.
    pub async fn replace_products(&self, products: &[Product]) -> DbResult<()> {
        let payloads = products
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;

        for (product, payload) in products.iter().zip(&payloads) {
            sqlx::query(
                r#"
                INSERT INTO products (id, category_id, barcode, name, payload)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(product.id)
            .bind(product.category_id)
            .bind(product.barcode.as_deref())
            .bind(&product.name)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(count = products.len(), "Product mirror replaced");
        Ok(())
    }

    /// Shared replacement for the `(id, name, payload)` tables.
    async fn replace_named(&self, table: &'static str, rows: Vec<(i64, String, String)>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;

        let insert = format!("INSERT INTO {table} (id, name, payload) VALUES (?1, ?2, ?3)");
        for (id, name, payload) in &rows {
            sqlx::query(&insert)
                .bind(id)
                .bind(name)
                .bind(payload)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(table, count = rows.len(), "Mirror replaced");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn branches(&self) -> DbResult<Vec<Branch>> {
        self.load("SELECT payload FROM branches ORDER BY id").await
    }

    pub async fn categories(&self) -> DbResult<Vec<Category>> {
        self.load("SELECT payload FROM categories ORDER BY id").await
    }

    pub async fn users(&self) -> DbResult<Vec<User>> {
        self.load("SELECT payload FROM users ORDER BY id").await
    }

    pub async fn products(&self) -> DbResult<Vec<Product>> {
        self.load("SELECT payload FROM products ORDER BY id").await
    }

    /// Products shown under one category tab.
    pub async fn products_in_category(&self, category_id: i64) -> DbResult<Vec<Product>> {
        let payloads: Vec<String> =
            sqlx::query_scalar("SELECT payload FROM products WHERE category_id = ?1 ORDER BY id")
                .bind(category_id)
                .fetch_all(&self.pool)
                .await?;

        decode_all(payloads)
    }

    /// Exact barcode lookup.
    pub async fn product_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM products WHERE barcode = ?1 ORDER BY id LIMIT 1")
                .bind(barcode)
                .fetch_optional(&self.pool)
                .await?;

        payload.map(|p| decode(&p)).transpose()
    }

    /// Resolves raw scanner input, including weighed-item scale labels.
    pub async fn lookup_scan(&self, raw: &str) -> DbResult<Option<ScanMatch>> {
        match ScanInput::parse(raw) {
            ScanInput::Plain(code) => Ok(self.product_by_barcode(&code).await?.map(|product| {
                ScanMatch {
                    product,
                    quantity: None,
                }
            })),
            weighed @ ScanInput::Weighed { .. } => {
                let candidates: Vec<Product> = self
                    .load("SELECT payload FROM products WHERE barcode IS NOT NULL ORDER BY id")
                    .await?;
                Ok(weighed.resolve(&candidates))
            }
        }
    }

    /// True when the branch mirror holds nothing.
    pub async fn is_empty(&self) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM branches")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }

    async fn load<T: DeserializeOwned>(&self, sql: &'static str) -> DbResult<Vec<T>> {
        let payloads: Vec<String> = sqlx::query_scalar(sql).fetch_all(&self.pool).await?;
        decode_all(payloads)
    }
}

fn decode<T: DeserializeOwned>(payload: &str) -> DbResult<T> {
    Ok(serde_json::from_str(payload)?)
}

fn decode_all<T: DeserializeOwned>(payloads: Vec<String>) -> DbResult<Vec<T>> {
    payloads.iter().map(|p| decode(p)).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use meridian_core::{Branch, Category, Money, Product, ProductUnit, User, UserRole};
    use rust_decimal::Decimal;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn product(id: i64, category_id: i64, barcode: Option<&str>) -> Product {
        Product {
            id,
            category_id: Some(category_id),
            name: format!("Product {id}"),
            price: Money::from_decimal(Decimal::new(1995, 3)),
            cost_price: Money::from_minor(100),
            unit: ProductUnit::Piece,
            barcode: barcode.map(str::to_string),
            image_url: None,
            stock_quantity: Decimal::new(125, 1),
            low_stock_threshold: Decimal::TEN,
        }
    }

    #[tokio::test]
    async fn test_product_mirror_shrinks_wholesale() {
        let db = db().await;
        let reference = db.reference();

        let ten: Vec<Product> = (1..=10).map(|id| product(id, 1, None)).collect();
        reference.replace_products(&ten).await.unwrap();
        assert_eq!(reference.products().await.unwrap().len(), 10);

        let seven: Vec<Product> = (4..=10).map(|id| product(id, 1, None)).collect();
        reference.replace_products(&seven).await.unwrap();

        let mirrored = reference.products().await.unwrap();
        assert_eq!(mirrored.len(), 7);
        assert_eq!(mirrored, seven);
    }

    #[tokio::test]
    async fn test_prices_round_trip_exactly() {
        let db = db().await;
        let original = product(1, 1, Some("123"));
        db.reference().replace_products(&[original.clone()]).await.unwrap();

        let stored = db.reference().product_by_barcode("123").await.unwrap().unwrap();
        assert_eq!(stored.price.as_decimal(), Decimal::new(1995, 3));
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_products_in_category() {
        let db = db().await;
        db.reference()
            .replace_products(&[product(1, 1, None), product(2, 2, None), product(3, 1, None)])
            .await
            .unwrap();

        let ids: Vec<i64> = db
            .reference()
            .products_in_category(1)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_lookup_scan() {
        let db = db().await;
        db.reference()
            .replace_products(&[product(1, 1, Some("6281000")), product(2, 1, Some("42"))])
            .await
            .unwrap();

        let plain = db.reference().lookup_scan("6281000").await.unwrap().unwrap();
        assert_eq!(plain.product.id, 1);
        assert_eq!(plain.quantity, None);

        let weighed = db.reference().lookup_scan("2000042012505").await.unwrap().unwrap();
        assert_eq!(weighed.product.id, 2);
        assert_eq!(weighed.quantity, Some(Decimal::new(1250, 3)));

        assert!(db.reference().lookup_scan("999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_named_mirrors() {
        let db = db().await;
        let reference = db.reference();
        assert!(reference.is_empty().await.unwrap());

        reference
            .replace_branches(&[
                Branch { id: 2, name: "Olaya".into(), location: None },
                Branch { id: 1, name: "Malqa".into(), location: Some("North".into()) },
            ])
            .await
            .unwrap();
        reference
            .replace_categories(&[Category { id: 1, name: "Fruit".into() }])
            .await
            .unwrap();
        reference
            .replace_users(&[User {
                id: 1,
                name: "Sara".into(),
                pin: "1234".into(),
                role: UserRole::Cashier,
                branch_id: Some(1),
                branch_name: Some("Malqa".into()),
            }])
            .await
            .unwrap();

        assert!(!reference.is_empty().await.unwrap());
        let branches = reference.branches().await.unwrap();
        assert_eq!(branches[0].id, 1);
        assert_eq!(branches[0].location.as_deref(), Some("North"));
        assert_eq!(reference.categories().await.unwrap().len(), 1);
        assert_eq!(reference.users().await.unwrap()[0].role, UserRole::Cashier);

        reference.replace_branches(&[]).await.unwrap();
        assert!(reference.is_empty().await.unwrap());
    }
}
