//! # Stock Store
//!
//! The capability the Stock Ledger needs from persistence: lock a stock row,
//! write it, and append to the transaction log, all inside one transaction.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Task A                          Task B                                 │
//! │  ──────                          ──────                                 │
//! │  BEGIN                           BEGIN                                  │
//! │  lock_for_update(k) ─► granted   lock_for_update(k) ─► waits…          │
//! │  read qty = 50                                        (busy_timeout)    │
//! │  write qty = 45                                                         │
//! │  append transaction                                                     │
//! │  COMMIT ─────────────────────────────────────────────► granted          │
//! │                                  read qty = 45  (sees A's write)        │
//! │                                  write qty = 40                         │
//! │                                  COMMIT                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLite Implementation
//! SQLite has no `SELECT … FOR UPDATE`. A deferred transaction takes the
//! database write lock at its first write statement, so `lock_for_update`
//! opens with a no-op `UPDATE` on the row. Competing writers block on the
//! connection's `busy_timeout` until the holder commits or rolls back. The
//! lock is database-wide rather than per row; the trait only promises that
//! the row is exclusively held.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use till_core::{StockKey, StockLevel, StockTransaction};

/// Transaction-scoped access to stock rows.
///
/// Every method runs inside the caller's transaction. The lock acquired by
/// [`lock_for_update`](StockStore::lock_for_update) is held until that
/// transaction commits or rolls back.
#[async_trait]
pub trait StockStore: Send {
    /// Blocks until the caller exclusively holds the row for `key`, then
    /// returns its current state (`None` when no row exists yet).
    async fn lock_for_update(&mut self, key: &StockKey) -> DbResult<Option<StockLevel>>;

    /// Creates the row for `key` holding `quantity`.
    async fn insert_level(&mut self, key: &StockKey, quantity: i64, now: DateTime<Utc>) -> DbResult<StockLevel>;

    /// Overwrites the quantity of row `stock_id`.
    async fn write_level(&mut self, stock_id: &str, quantity: i64, now: DateTime<Utc>) -> DbResult<()>;

    /// Appends an entry to the immutable transaction log.
    async fn append_transaction(&mut self, entry: &StockTransaction) -> DbResult<()>;
}

pub(crate) const STOCK_COLUMNS: &str =
    "id, product_id, warehouse_id, quantity, reserved_quantity, created_at, updated_at";

#[async_trait]
impl StockStore for SqliteConnection {
    async fn lock_for_update(&mut self, key: &StockKey) -> DbResult<Option<StockLevel>> {
        debug!(product_id = %key.product_id, warehouse_id = ?key.warehouse_id, "Locking stock row");

        // First write of the transaction: acquires the write lock even when
        // no row matches
        sqlx::query("UPDATE stocks SET quantity = quantity WHERE product_id = ?1 AND warehouse_id IS ?2")
            .bind(key.product_id.as_str())
            .bind(key.warehouse_id.as_deref())
            .execute(&mut *self)
            .await?;

        let level = sqlx::query_as::<_, StockLevel>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE product_id = ?1 AND warehouse_id IS ?2"
        ))
        .bind(key.product_id.as_str())
        .bind(key.warehouse_id.as_deref())
        .fetch_optional(&mut *self)
        .await?;

        Ok(level)
    }

    async fn insert_level(&mut self, key: &StockKey, quantity: i64, now: DateTime<Utc>) -> DbResult<StockLevel> {
        let level = StockLevel {
            id: Uuid::new_v4().to_string(),
            product_id: key.product_id.clone(),
            warehouse_id: key.warehouse_id.clone(),
            quantity,
            reserved_quantity: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(stock_id = %level.id, quantity, "Creating stock row");

        sqlx::query(
            r#"
            INSERT INTO stocks (id, product_id, warehouse_id, quantity, reserved_quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&level.id)
        .bind(&level.product_id)
        .bind(&level.warehouse_id)
        .bind(level.quantity)
        .bind(level.reserved_quantity)
        .bind(level.created_at)
        .bind(level.updated_at)
        .execute(&mut *self)
        .await?;

        Ok(level)
    }

    async fn write_level(&mut self, stock_id: &str, quantity: i64, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE stocks SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(stock_id)
            .bind(quantity)
            .bind(now)
            .execute(&mut *self)
            .await?;
        Ok(())
    }

    async fn append_transaction(&mut self, entry: &StockTransaction) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, stock_id, product_id, user_id, quantity,
                direction, sub_type, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.stock_id)
        .bind(&entry.product_id)
        .bind(&entry.user_id)
        .bind(entry.quantity)
        .bind(entry.direction)
        .bind(entry.sub_type)
        .bind(&entry.notes)
        .bind(entry.created_at)
        .execute(&mut *self)
        .await?;
        Ok(())
    }
}
