//! # Checkout Service
//!
//! Places an order: prices every line, debits stock through the ledger and
//! records the order, all in one transaction.
//!
//! ## place_order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate_place_order()                     → InvalidRequest            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    insert_shell()            ← first write: takes the write lock       │
//! │                                                                         │
//! │    for line in request.items (request order):                          │
//! │      ├── fetch_with_promotions()            → ProductNotFound           │
//! │      ├── quantity ≥ line.quantity?          → InsufficientStock         │
//! │      ├── apply_movement(out, sale)          ← ledger row + log entry   │
//! │      ├── price_line() ──► totals.add()                                 │
//! │      └── buy_x_get_y? ── fetch(get product) → GetProductNotFound        │
//! │                          └── free_item()    (no stock debit)           │
//! │                                                                         │
//! │    insert_items()                                                       │
//! │    resolve_cart_discount(cart promotions, sub_total)                    │
//! │    totals.finish() ──► update_totals()                                  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! Every error returns early and drops the transaction. Nothing survives a
//! failed order: no order row, no items, no stock debit, no ledger entry.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::repository::cart_promotion::CartPromotionRepository;
use crate::repository::{order, product};
use crate::service::error::OrderError;
use crate::service::ledger::apply_movement;
use till_core::pricing::{free_item, price_line};
use till_core::promotion::resolve_cart_discount;
use till_core::validation::validate_place_order;
use till_core::{Order, OrderTotals, PlaceOrderRequest, StockMovement};

#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutService { pool }
    }

    /// Places an order priced at the current time.
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Order, OrderError> {
        self.place_order_at(request, Utc::now()).await
    }

    /// Places an order with promotions resolved at `now`.
    ///
    /// `now` is also the order's `created_at`.
    pub async fn place_order_at(
        &self,
        request: &PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        validate_place_order(request)?;

        let mut tx = self.pool.begin().await?;

        let mut placed = order::insert_shell(&mut *tx, &request.user_id, request.payment_method, now).await?;

        let mut drafts = Vec::with_capacity(request.items.len());
        let mut totals = OrderTotals::default();

        for line in &request.items {
            let Some(item_product) = product::fetch_with_promotions(&mut *tx, &line.product_id).await? else {
                warn!(order_id = %placed.id, product_id = %line.product_id, "Order line for unknown product");
                return Err(OrderError::ProductNotFound(line.product_id.clone()));
            };

            if !item_product.has_stock_for(line.quantity) {
                warn!(
                    order_id = %placed.id,
                    product_id = %item_product.id,
                    available = item_product.quantity,
                    requested = line.quantity,
                    "Insufficient stock for order line"
                );
                return Err(OrderError::InsufficientStock {
                    product_id: item_product.id,
                    available: item_product.quantity,
                    requested: line.quantity,
                });
            }

            let debit = StockMovement::sale(&item_product.id, &request.user_id, line.quantity, &placed.id);
            apply_movement(&mut *tx, &debit, now)
                .await
                .map_err(|e| OrderError::from_debit(e, line.quantity))?;

            let priced = price_line(&item_product, line.quantity, now);
            totals.add(&priced.item);
            drafts.push(priced.item);

            if let Some(claim) = priced.free_item {
                let Some(get_product) = product::fetch(&mut *tx, &claim.get_product_id).await? else {
                    warn!(
                        order_id = %placed.id,
                        promotion_id = %claim.promotion_id,
                        get_product_id = %claim.get_product_id,
                        "Free item product no longer exists"
                    );
                    return Err(OrderError::GetProductNotFound(claim.get_product_id));
                };

                debug!(
                    order_id = %placed.id,
                    promotion_id = %claim.promotion_id,
                    product_id = %get_product.id,
                    quantity = claim.quantity,
                    "Adding free item"
                );
                drafts.push(free_item(&get_product, claim.quantity));
            }
        }

        placed.items = order::insert_items(&mut *tx, &placed.id, &drafts, now).await?;

        let cart_promotions = CartPromotionRepository::fetch_all(&mut *tx).await?;
        let cart_discount = resolve_cart_discount(&cart_promotions, totals.sub_total(), now);
        let final_totals = totals.finish(cart_discount);

        order::update_totals(&mut *tx, &placed.id, &final_totals, now).await?;

        tx.commit().await?;

        placed.gross_total_cents = final_totals.gross_total.cents();
        placed.item_discount_total_cents = final_totals.item_discount_total.cents();
        placed.sub_total_cents = final_totals.sub_total.cents();
        placed.cart_discount_cents = final_totals.cart_discount.cents();
        placed.total_amount_cents = final_totals.total_amount.cents();

        info!(
            order_id = %placed.id,
            user_id = %placed.user_id,
            lines = placed.items.len(),
            total = %final_totals.total_amount,
            "Order placed"
        );

        Ok(placed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
