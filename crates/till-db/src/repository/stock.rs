//! Read side of the Stock Ledger: stock levels and the transaction log.
//!
//! All writes go through [`StockLedger`](crate::service::ledger::StockLedger)
//! or checkout, which hold the row lock.

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::store::STOCK_COLUMNS;
use till_core::{StockKey, StockLevel, StockTransaction};

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Current level for one (product, warehouse) pair, if a row exists.
    pub async fn get_level(&self, key: &StockKey) -> DbResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE product_id = ?1 AND warehouse_id IS ?2"
        ))
        .bind(key.product_id.as_str())
        .bind(key.warehouse_id.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }

    /// Every stock row of a product, default location first.
    pub async fn list_levels(&self, product_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(&format!(
            r#"
            SELECT {STOCK_COLUMNS}
            FROM stocks
            WHERE product_id = ?1
            ORDER BY warehouse_id IS NOT NULL, warehouse_id
            "#
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    /// The most recent `limit` ledger entries of a product, newest first.
    pub async fn list_transactions(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockTransaction>> {
        let entries = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT id, stock_id, product_id, user_id, quantity,
                   direction, sub_type, notes, created_at
            FROM stock_transactions
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Number of ledger entries of a product.
    pub async fn count_transactions(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_transactions WHERE product_id = ?1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
