//! # Order Repository
//!
//! Reads committed orders, and provides the connection-scoped writes the
//! checkout service uses inside its transaction.
//!
//! ## Write Sequence (checkout)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    insert_shell()      ← totals zero; first write takes the lock       │
//! │    …debit stock, price lines…                                          │
//! │    insert_items()      ← every line, positions 0..n in request order   │
//! │    update_totals()     ← gross, discounts, sub-total, cart, total      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{FinalTotals, Order, OrderItem, OrderItemDraft, PaymentMethod};

const ORDER_COLUMNS: &str = r#"
    id, user_id, payment_method, gross_total_cents, item_discount_total_cents,
    sub_total_cents, cart_discount_cents, total_amount_cents, created_at, updated_at
"#;

const ORDER_ITEM_COLUMNS: &str = r#"
    id, order_id, product_id, position, quantity, price_cents,
    discounted_price_cents, item_discount_cents, is_free_item, created_at
"#;

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets a live order with its items in position order.
    pub async fn get_with_items(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(mut order) = order else {
            return Ok(None);
        };

        order.items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY position"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(order))
    }

    /// Lists live orders newest first, optionally for one user.
    ///
    /// Items are not loaded; use [`get_with_items`](Self::get_with_items).
    pub async fn list(&self, user_id: Option<&str>, limit: u32, offset: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE deleted_at IS NULL AND (?1 IS NULL OR user_id = ?1)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Soft-deletes an order. Stock debited by the order is not restored.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting order");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE orders SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Transaction-scoped writes
// =============================================================================

/// Inserts the order row with all totals zero and returns it.
pub(crate) async fn insert_shell(
    conn: &mut SqliteConnection,
    user_id: &str,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> DbResult<Order> {
    let order = Order {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        payment_method,
        gross_total_cents: 0,
        item_discount_total_cents: 0,
        sub_total_cents: 0,
        cart_discount_cents: 0,
        total_amount_cents: 0,
        items: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    debug!(order_id = %order.id, user_id = %user_id, "Inserting order shell");

    sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, payment_method, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.payment_method)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(order)
}

/// Inserts `drafts` as the order's lines, positioned in slice order.
pub(crate) async fn insert_items(
    conn: &mut SqliteConnection,
    order_id: &str,
    drafts: &[OrderItemDraft],
    now: DateTime<Utc>,
) -> DbResult<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(drafts.len());

    for (position, draft) in drafts.iter().enumerate() {
        let item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: draft.product_id.clone(),
            position: position as i64,
            quantity: draft.quantity,
            price_cents: draft.price.cents(),
            discounted_price_cents: draft.discounted_price.cents(),
            item_discount_cents: draft.item_discount.cents(),
            is_free_item: draft.is_free_item,
            created_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO order_items ({ORDER_ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(item.position)
        .bind(item.quantity)
        .bind(item.price_cents)
        .bind(item.discounted_price_cents)
        .bind(item.item_discount_cents)
        .bind(item.is_free_item)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    debug!(order_id = %order_id, count = items.len(), "Inserted order items");
    Ok(items)
}

/// Writes the final totals onto the order row.
pub(crate) async fn update_totals(
    conn: &mut SqliteConnection,
    order_id: &str,
    totals: &FinalTotals,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET gross_total_cents = ?2,
            item_discount_total_cents = ?3,
            sub_total_cents = ?4,
            cart_discount_cents = ?5,
            total_amount_cents = ?6,
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(totals.gross_total.cents())
    .bind(totals.item_discount_total.cents())
    .bind(totals.sub_total.cents())
    .bind(totals.cart_discount.cents())
    .bind(totals.total_amount.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
