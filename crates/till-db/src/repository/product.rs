//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD with an explicit SKU duplicate check
//! - Loading a product together with its promotions for pricing
//!
//! ## Quantity Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products p                                                             │
//! │     LEFT JOIN stocks s ON s.product_id = p.id                           │
//! │                       AND s.warehouse_id IS NULL   ← default location  │
//! │                                                                         │
//! │  quantity          = COALESCE(s.quantity, 0)                            │
//! │  reserved_quantity = COALESCE(s.reserved_quantity, 0)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Stock is owned by the ledger; this repository never writes `stocks`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::promotion::PromotionRepository;
use till_core::validation::validate_new_product;
use till_core::{NewProduct, Product};

const PRODUCT_SELECT: &str = r#"
    SELECT
        p.id,
        p.sku,
        p.name,
        p.price_cents,
        p.category_id,
        COALESCE(s.quantity, 0) AS quantity,
        COALESCE(s.reserved_quantity, 0) AS reserved_quantity,
        p.created_at,
        p.updated_at
    FROM products p
    LEFT JOIN stocks s ON s.product_id = p.id AND s.warehouse_id IS NULL
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.insert(&NewProduct { sku: "TEA-1".into(), .. }).await?;
/// let loaded = repo.get_with_promotions(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a live product by its ID, without promotions.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a live product by its ID with promotions in storage order.
    pub async fn get_with_promotions(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_with_promotions(&mut conn, id).await
    }

    /// Gets a live product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.sku = ?1 AND p.deleted_at IS NULL"
        ))
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists live products ordered by name.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.deleted_at IS NULL ORDER BY p.name LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Duplicate SKU
    /// Checked explicitly first so callers get a clean
    /// `UniqueViolation { field: "sku", value }`; the partial unique index
    /// remains the backstop for concurrent inserts.
    pub async fn insert(&self, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;
        let sku = input.sku.trim();

        if self.get_by_sku(sku).await?.is_some() {
            return Err(DbError::duplicate("sku", sku));
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: input.name.trim().to_string(),
            price_cents: input.price_cents,
            category_id: input.category_id.clone(),
            quantity: 0,
            reserved_quantity: 0,
            promotions: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_cents, category_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(&product.category_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| sku_conflict(e, sku))?;

        Ok(product)
    }

    /// Updates name, SKU, price and category of a live product.
    pub async fn update(&self, id: &str, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;
        let sku = input.sku.trim();

        if let Some(existing) = self.get_by_sku(sku).await? {
            if existing.id != id {
                return Err(DbError::duplicate("sku", sku));
            }
        }

        debug!(id = %id, sku = %sku, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = ?2, name = ?3, price_cents = ?4, category_id = ?5, updated_at = ?6
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(sku)
        .bind(input.name.trim())
        .bind(input.price_cents)
        .bind(&input.category_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| sku_conflict(e, sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Soft-deletes a product. Its SKU becomes available again.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE products SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts live products (for diagnostics and the seeder).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-scoped reads
// =============================================================================

/// Loads a live product on the caller's connection.
/// Reports the unique-index backstop as the same `duplicate("sku")` error
/// the explicit pre-check returns.
fn sku_conflict(err: sqlx::Error, sku: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", sku),
        other => other,
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "{PRODUCT_SELECT} WHERE p.id = ?1 AND p.deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Loads a live product and its live promotions on the caller's connection.
pub(crate) async fn fetch_with_promotions(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let Some(mut product) = fetch(conn, id).await? else {
        return Ok(None);
    };

    product.promotions = PromotionRepository::fetch_for_product(conn, id).await?;
    Ok(Some(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use till_core::ErrorKind;

    fn tea() -> NewProduct {
        NewProduct {
            sku: "TEA-1".into(),
            name: "Green Tea".into(),
            price_cents: 350,
            category_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.products().insert(&tea()).await.unwrap();

        let loaded = db.products().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "TEA-1");
        assert_eq!(loaded.price_cents, 350);
        assert_eq!(loaded.quantity, 0);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&tea()).await.unwrap();

        let err = db.products().insert(&tea()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_soft_delete_frees_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.products().insert(&tea()).await.unwrap();

        db.products().soft_delete(&created.id).await.unwrap();
        assert!(db.products().get_by_id(&created.id).await.unwrap().is_none());

        // deleting twice is NotFound
        assert!(matches!(
            db.products().soft_delete(&created.id).await,
            Err(DbError::NotFound { .. })
        ));

        db.products().insert(&tea()).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_rejects_taken_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&tea()).await.unwrap();
        let coffee = db
            .products()
            .insert(&NewProduct {
                sku: "COF-1".into(),
                name: "Coffee".into(),
                price_cents: 500,
                category_id: None,
            })
            .await
            .unwrap();

        let err = db.products().update(&coffee.id, &tea()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let renamed = db
            .products()
            .update(
                &coffee.id,
                &NewProduct {
                    name: "Dark Roast".into(),
                    ..NewProduct {
                        sku: "COF-1".into(),
                        name: String::new(),
                        price_cents: 650,
                        category_id: None,
                    }
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Dark Roast");
        assert_eq!(renamed.price_cents, 650);
    }

    #[tokio::test]
    async fn test_index_backstop_reports_sku_duplicate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&tea()).await.unwrap();
        let coffee = db
            .products()
            .insert(&NewProduct {
                sku: "COF-1".into(),
                name: "Coffee".into(),
                price_cents: 500,
                category_id: None,
            })
            .await
            .unwrap();

        // Skips the pre-check, as a concurrent rename would
        let raw = sqlx::query("UPDATE products SET sku = ?2 WHERE id = ?1")
            .bind(&coffee.id)
            .bind(&tea().sku)
            .execute(db.pool())
            .await
            .unwrap_err();

        match sku_conflict(raw, &tea().sku) {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "sku");
                assert_eq!(value, tea().sku);
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_price_above_ceiling_is_validation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .products()
            .insert(&NewProduct {
                price_cents: till_core::MAX_PRICE_CENTS + 1,
                ..tea()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_is_validation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .products()
            .insert(&NewProduct {
                sku: "bad sku".into(),
                ..tea()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
