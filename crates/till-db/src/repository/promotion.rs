//! # Promotion Repository
//!
//! Product promotions. Rows are flat (one nullable column per rule field) and
//! are rebuilt into a typed [`PromotionRule`] on read; a row whose columns
//! do not fit its `promotion_type` fails to load rather than pricing wrong.
//!
//! Promotions are always returned in storage order (`created_at`, then
//! insertion order), which is the order the resolver relies on.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{CoreError, NewPromotion, Promotion, PromotionRule, PromotionType};

const PROMOTION_COLUMNS: &str = r#"
    id, product_id, promotion_type, discount_value, buy_product_id,
    get_product_id, required_quantity, promo_price_cents,
    start_date, end_date, created_at
"#;

/// Raw `promotions` row.
#[derive(Debug, FromRow)]
struct PromotionRow {
    id: String,
    product_id: String,
    promotion_type: PromotionType,
    discount_value: Option<i64>,
    buy_product_id: Option<String>,
    get_product_id: Option<String>,
    required_quantity: Option<i64>,
    promo_price_cents: Option<i64>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = CoreError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        let rule = PromotionRule::from_parts(
            row.promotion_type,
            row.discount_value,
            row.buy_product_id,
            row.get_product_id,
            row.required_quantity,
            row.promo_price_cents,
        )?;

        Ok(Promotion {
            id: row.id,
            product_id: row.product_id,
            rule,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
        })
    }
}

/// Flat column values for a rule, in `from_parts` order.
fn rule_columns(
    rule: &PromotionRule,
) -> (Option<i64>, Option<&str>, Option<&str>, Option<i64>, Option<i64>) {
    match rule {
        PromotionRule::PercentageDiscount { percent_bps } => (Some(i64::from(*percent_bps)), None, None, None, None),
        PromotionRule::FixedDiscount { amount_cents } => (Some(*amount_cents), None, None, None, None),
        PromotionRule::BuyXGetY {
            buy_product_id,
            get_product_id,
        } => (None, Some(buy_product_id), Some(get_product_id), None, None),
        PromotionRule::BundlePrice {
            required_quantity,
            promo_price_cents,
        } => (None, None, None, Some(*required_quantity), Some(*promo_price_cents)),
    }
}

fn decode_all(rows: Vec<PromotionRow>) -> DbResult<Vec<Promotion>> {
    rows.into_iter()
        .map(|row| Promotion::try_from(row).map_err(DbError::from))
        .collect()
}

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Creates a promotion for a live product.
    ///
    /// For `buy_x_get_y` both referenced products must exist too, and the
    /// "buy" product must be the promotion's own product, since that is the
    /// only product whose lines can trigger it.
    pub async fn create(&self, input: &NewPromotion) -> DbResult<Promotion> {
        input.validate()?;

        let mut conn = self.pool.acquire().await?;
        check_references(&mut conn, input).await?;

        let now = Utc::now();
        let promotion = Promotion {
            id: Uuid::new_v4().to_string(),
            product_id: input.product_id.clone(),
            rule: input.rule.clone(),
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: now,
        };
        let (discount_value, buy, get, required_quantity, promo_price) = rule_columns(&promotion.rule);

        debug!(
            id = %promotion.id,
            product_id = %promotion.product_id,
            promotion_type = %promotion.rule.promotion_type(),
            "Inserting promotion"
        );

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, product_id, promotion_type, discount_value, buy_product_id,
                get_product_id, required_quantity, promo_price_cents,
                start_date, end_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
        )
        .bind(&promotion.id)
        .bind(&promotion.product_id)
        .bind(promotion.rule.promotion_type())
        .bind(discount_value)
        .bind(buy)
        .bind(get)
        .bind(required_quantity)
        .bind(promo_price)
        .bind(promotion.start_date)
        .bind(promotion.end_date)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(promotion)
    }

    /// Replaces a live promotion's product, rule and window.
    ///
    /// Runs the same checks as [`create`](Self::create). `created_at` is
    /// kept, so the promotion keeps its place in storage order.
    pub async fn update(&self, id: &str, input: &NewPromotion) -> DbResult<Promotion> {
        input.validate()?;

        let mut conn = self.pool.acquire().await?;
        check_references(&mut conn, input).await?;

        let (discount_value, buy, get, required_quantity, promo_price) = rule_columns(&input.rule);

        debug!(
            id = %id,
            product_id = %input.product_id,
            promotion_type = %input.rule.promotion_type(),
            "Updating promotion"
        );

        let result = sqlx::query(
            r#"
            UPDATE promotions SET
                product_id = ?2, promotion_type = ?3, discount_value = ?4,
                buy_product_id = ?5, get_product_id = ?6, required_quantity = ?7,
                promo_price_cents = ?8, start_date = ?9, end_date = ?10, updated_at = ?11
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&input.product_id)
        .bind(input.rule.promotion_type())
        .bind(discount_value)
        .bind(buy)
        .bind(get)
        .bind(required_quantity)
        .bind(promo_price)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Promotion", id));
        }

        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Promotion::try_from(row)?)
    }

    /// Gets a live promotion by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Promotion>> {
        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Promotion::try_from(r).map_err(DbError::from)).transpose()
    }

    /// Lists a product's live promotions in storage order.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Promotion>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_for_product(&mut conn, product_id).await
    }

    /// Soft-deletes a promotion.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting promotion");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE promotions SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Promotion", id));
        }
        Ok(())
    }

    /// Loads a product's live promotions on the caller's connection.
    pub(crate) async fn fetch_for_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<Promotion>> {
        let rows = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            WHERE product_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at, rowid
            "#
        ))
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        decode_all(rows)
    }
}

/// The promotion's product must be live. For `buy_x_get_y` the "buy"
/// product must be that same product and the "get" product must be live.
async fn check_references(conn: &mut SqliteConnection, input: &NewPromotion) -> DbResult<()> {
    ensure_product(conn, &input.product_id).await?;

    if let PromotionRule::BuyXGetY {
        buy_product_id,
        get_product_id,
    } = &input.rule
    {
        if buy_product_id != &input.product_id {
            return Err(DbError::Validation(till_core::ValidationError::InvalidFormat {
                field: "buy_product_id".to_string(),
                reason: "must equal the promotion's product_id".to_string(),
            }));
        }
        ensure_product(conn, get_product_id).await?;
    }

    Ok(())
}

async fn ensure_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<()> {
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1 AND deleted_at IS NULL")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(DbError::not_found("Product", product_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use till_core::{ErrorKind, NewProduct};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = db
            .products()
            .insert(&NewProduct {
                sku: "X-1".into(),
                name: "Burger".into(),
                price_cents: 800,
                category_id: None,
            })
            .await
            .unwrap();
        let y = db
            .products()
            .insert(&NewProduct {
                sku: "Y-1".into(),
                name: "Fries".into(),
                price_cents: 300,
                category_id: None,
            })
            .await
            .unwrap();
        (db, x.id, y.id)
    }

    fn new_promotion(product_id: &str, rule: PromotionRule) -> NewPromotion {
        let now = Utc::now();
        NewPromotion {
            product_id: product_id.to_string(),
            rule,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_in_storage_order() {
        let (db, x, _) = setup().await;
        let repo = db.promotions();

        let first = repo
            .create(&new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 50 }))
            .await
            .unwrap();
        let second = repo
            .create(&new_promotion(
                &x,
                PromotionRule::BundlePrice {
                    required_quantity: 3,
                    promo_price_cents: 2000,
                },
            ))
            .await
            .unwrap();

        let listed = repo.list_for_product(&x).await.unwrap();
        assert_eq!(
            listed.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec![first.id.as_str(), second.id.as_str()]
        );
        assert_eq!(listed[1].rule, second.rule);

        let product = db.products().get_with_promotions(&x).await.unwrap().unwrap();
        assert_eq!(product.promotions.len(), 2);
    }

    #[tokio::test]
    async fn test_buy_x_get_y_round_trips_through_columns() {
        let (db, x, y) = setup().await;
        let rule = PromotionRule::BuyXGetY {
            buy_product_id: x.clone(),
            get_product_id: y.clone(),
        };
        let created = db.promotions().create(&new_promotion(&x, rule.clone())).await.unwrap();

        let loaded = db.promotions().get(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.rule, rule);
        assert_eq!(loaded.free_item_for(&x), Some(y.as_str()));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_get_product() {
        let (db, x, _) = setup().await;
        let rule = PromotionRule::BuyXGetY {
            buy_product_id: x.clone(),
            get_product_id: Uuid::new_v4().to_string(),
        };
        let err = db.promotions().create(&new_promotion(&x, rule)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_rule_and_window() {
        let (db, x, _) = setup().await;

        let err = db
            .promotions()
            .create(&new_promotion(&x, PromotionRule::PercentageDiscount { percent_bps: 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut inverted = new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 10 });
        std::mem::swap(&mut inverted.start_date, &mut inverted.end_date);
        let err = db.promotions().create(&inverted).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_soft_deleted_promotion_is_hidden() {
        let (db, x, _) = setup().await;
        let created = db
            .promotions()
            .create(&new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 50 }))
            .await
            .unwrap();

        db.promotions().soft_delete(&created.id).await.unwrap();
        assert!(db.promotions().get(&created.id).await.unwrap().is_none());
        assert!(db.promotions().list_for_product(&x).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_rule_and_keeps_order() {
        let (db, x, y) = setup().await;
        let repo = db.promotions();

        let first = repo
            .create(&new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 50 }))
            .await
            .unwrap();
        let second = repo
            .create(&new_promotion(&x, PromotionRule::PercentageDiscount { percent_bps: 500 }))
            .await
            .unwrap();

        let rule = PromotionRule::BundlePrice {
            required_quantity: 2,
            promo_price_cents: 1200,
        };
        let before = repo.get(&first.id).await.unwrap().unwrap();
        let updated = repo.update(&first.id, &new_promotion(&x, rule.clone())).await.unwrap();
        assert_eq!(updated.rule, rule);
        assert_eq!(updated.created_at, before.created_at);

        let listed = repo.list_for_product(&x).await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[0].rule, rule);
        assert_eq!(listed[1].id, second.id);

        let moved = repo
            .update(&second.id, &new_promotion(&y, PromotionRule::PercentageDiscount { percent_bps: 500 }))
            .await
            .unwrap();
        assert_eq!(moved.product_id, y);
        assert_eq!(repo.list_for_product(&x).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_revalidates() {
        let (db, x, y) = setup().await;
        let repo = db.promotions();
        let created = repo
            .create(&new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 50 }))
            .await
            .unwrap();

        let err = repo
            .update(&created.id, &new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let missing_get = PromotionRule::BuyXGetY {
            buy_product_id: x.clone(),
            get_product_id: Uuid::new_v4().to_string(),
        };
        let err = repo.update(&created.id, &new_promotion(&x, missing_get)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let wrong_buy = PromotionRule::BuyXGetY {
            buy_product_id: y.clone(),
            get_product_id: y.clone(),
        };
        let err = repo.update(&created.id, &new_promotion(&x, wrong_buy)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let stored = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.rule, PromotionRule::FixedDiscount { amount_cents: 50 });
    }

    #[tokio::test]
    async fn test_update_unknown_or_deleted_promotion_is_not_found() {
        let (db, x, _) = setup().await;
        let repo = db.promotions();
        let input = new_promotion(&x, PromotionRule::FixedDiscount { amount_cents: 50 });

        let err = repo.update(&Uuid::new_v4().to_string(), &input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let created = repo.create(&input).await.unwrap();
        repo.soft_delete(&created.id).await.unwrap();
        let err = repo.update(&created.id, &input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
