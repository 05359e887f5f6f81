//! # Cart Promotion Repository
//!
//! Cart-level promotions, always returned in storage order.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{CartPromotion, CartRule, CoreError, NewCartPromotion, PromotionType};

const CART_PROMOTION_COLUMNS: &str = r#"
    id, promotion_type, discount_value, minimum_purchase_cents,
    start_date, end_date, created_at
"#;

#[derive(Debug, FromRow)]
struct CartPromotionRow {
    id: String,
    promotion_type: PromotionType,
    discount_value: i64,
    minimum_purchase_cents: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartPromotionRow> for CartPromotion {
    type Error = CoreError;

    fn try_from(row: CartPromotionRow) -> Result<Self, Self::Error> {
        Ok(CartPromotion {
            id: row.id,
            rule: CartRule::from_parts(row.promotion_type, row.discount_value)?,
            minimum_purchase_cents: row.minimum_purchase_cents,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CartPromotionRepository {
    pool: SqlitePool,
}

impl CartPromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartPromotionRepository { pool }
    }

    pub async fn create(&self, input: &NewCartPromotion) -> DbResult<CartPromotion> {
        input.validate()?;

        let now = Utc::now();
        let promotion = CartPromotion {
            id: Uuid::new_v4().to_string(),
            rule: input.rule,
            minimum_purchase_cents: input.minimum_purchase_cents,
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: now,
        };

        debug!(
            id = %promotion.id,
            promotion_type = %promotion.rule.promotion_type(),
            minimum_purchase_cents = promotion.minimum_purchase_cents,
            "Inserting cart promotion"
        );

        sqlx::query(
            r#"
            INSERT INTO cart_promotions (
                id, promotion_type, discount_value, minimum_purchase_cents,
                start_date, end_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&promotion.id)
        .bind(promotion.rule.promotion_type())
        .bind(promotion.rule.discount_value())
        .bind(promotion.minimum_purchase_cents)
        .bind(promotion.start_date)
        .bind(promotion.end_date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(promotion)
    }

    /// Gets a live cart promotion by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<CartPromotion>> {
        let row = sqlx::query_as::<_, CartPromotionRow>(&format!(
            "SELECT {CART_PROMOTION_COLUMNS} FROM cart_promotions WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| CartPromotion::try_from(r).map_err(DbError::from)).transpose()
    }

    /// Replaces a live cart promotion's rule, threshold and window.
    /// `created_at` is kept.
    pub async fn update(&self, id: &str, input: &NewCartPromotion) -> DbResult<CartPromotion> {
        input.validate()?;

        debug!(
            id = %id,
            promotion_type = %input.rule.promotion_type(),
            minimum_purchase_cents = input.minimum_purchase_cents,
            "Updating cart promotion"
        );

        let result = sqlx::query(
            r#"
            UPDATE cart_promotions SET
                promotion_type = ?2, discount_value = ?3, minimum_purchase_cents = ?4,
                start_date = ?5, end_date = ?6, updated_at = ?7
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(input.rule.promotion_type())
        .bind(input.rule.discount_value())
        .bind(input.minimum_purchase_cents)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartPromotion", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("CartPromotion", id))
    }

    /// Lists live cart promotions in storage order.
    pub async fn list(&self) -> DbResult<Vec<CartPromotion>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_all(&mut conn).await
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting cart promotion");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE cart_promotions SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartPromotion", id));
        }
        Ok(())
    }

    /// Loads every live cart promotion on the caller's connection.
    pub(crate) async fn fetch_all(conn: &mut SqliteConnection) -> DbResult<Vec<CartPromotion>> {
        let rows = sqlx::query_as::<_, CartPromotionRow>(&format!(
            r#"
            SELECT {CART_PROMOTION_COLUMNS}
            FROM cart_promotions
            WHERE deleted_at IS NULL
            ORDER BY created_at, rowid
            "#
        ))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| CartPromotion::try_from(row).map_err(DbError::from))
            .collect()
    }
}
