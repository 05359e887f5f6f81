//! # Order Pricing Engine
//!
//! The pure half of checkout: turns a loaded product and a quantity into an
//! order line, and accumulates lines into order totals. The transactional
//! half (loading, debiting stock, persisting) is `till-db::service::checkout`.
//!
//! ## Line Pricing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price_line(product, q, now)                                            │
//! │       │                                                                 │
//! │       ├── resolve_item_discount() ──► discounted line total             │
//! │       │                                                                 │
//! │       ├── OrderItemDraft {                                              │
//! │       │       price            = list unit price                       │
//! │       │       discounted_price = line total                            │
//! │       │       item_discount    = price × q − line total                │
//! │       │   }                                                             │
//! │       │                                                                 │
//! │       └── buy_x_get_y for this product? ──► FreeItemClaim { get, q }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Free lines never contribute to the totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::promotion::resolve_item_discount;
use crate::types::Product;

// =============================================================================
// Lines
// =============================================================================

/// An order line before it has an order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemDraft {
    pub product_id: String,
    pub quantity: i64,
    pub price: Money,
    pub discounted_price: Money,
    pub item_discount: Money,
    pub is_free_item: bool,
}

/// A free line owed by a buy-X-get-Y promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeItemClaim {
    pub promotion_id: String,
    pub get_product_id: String,
    pub quantity: i64,
}

/// A priced paid line, plus the free line it earns, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub item: OrderItemDraft,
    pub free_item: Option<FreeItemClaim>,
}

/// Prices `quantity` units of `product` at `now`.
pub fn price_line(product: &Product, quantity: i64, now: DateTime<Utc>) -> PricedLine {
    let resolution = resolve_item_discount(product, quantity, now);
    let gross = product.price().multiply_quantity(quantity);

    let free_item = resolution.promotion.and_then(|promotion| {
        promotion.free_item_for(&product.id).map(|get_product_id| FreeItemClaim {
            promotion_id: promotion.id.clone(),
            get_product_id: get_product_id.to_string(),
            quantity,
        })
    });

    PricedLine {
        item: OrderItemDraft {
            product_id: product.id.clone(),
            quantity,
            price: product.price(),
            discounted_price: resolution.total,
            item_discount: gross - resolution.total,
            is_free_item: false,
        },
        free_item,
    }
}

/// The zero-charge line for a buy-X-get-Y claim.
///
/// The recorded discount is the get product's unit list price.
pub fn free_item(get_product: &Product, quantity: i64) -> OrderItemDraft {
    OrderItemDraft {
        product_id: get_product.id.clone(),
        quantity,
        price: get_product.price(),
        discounted_price: Money::zero(),
        item_discount: get_product.price(),
        is_free_item: true,
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Running totals over the paid lines of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderTotals {
    pub gross_total: Money,
    pub item_discount_total: Money,
}

/// Final order amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTotals {
    pub gross_total: Money,
    pub item_discount_total: Money,
    pub sub_total: Money,
    pub cart_discount: Money,
    pub total_amount: Money,
}

impl OrderTotals {
    /// Adds a line. Free lines are ignored.
    pub fn add(&mut self, item: &OrderItemDraft) {
        if item.is_free_item {
            return;
        }
        self.gross_total += item.price.multiply_quantity(item.quantity);
        self.item_discount_total += item.item_discount;
    }

    /// Gross minus item discounts; the base for cart promotions.
    pub fn sub_total(&self) -> Money {
        self.gross_total - self.item_discount_total
    }

    /// Applies the cart discount, clamped to `[0, sub_total]` so the total
    /// can never go negative.
    pub fn finish(&self, cart_discount: Money) -> FinalTotals {
        let sub_total = self.sub_total();
        let cart_discount = cart_discount.non_negative().min(sub_total.non_negative());
        FinalTotals {
            gross_total: self.gross_total,
            item_discount_total: self.item_discount_total,
            sub_total,
            cart_discount,
            total_amount: sub_total - cart_discount,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
