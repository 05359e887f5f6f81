//! # Domain Types
//!
//! Records shared by the pricing engine, the stock ledger and the admin
//! repositories.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)  │       │
//! │  │  sku (unique)   │   │  gross_total    │   │  product_id     │       │
//! │  │  price_cents    │   │  sub_total      │   │  price / disc.  │       │
//! │  │  quantity       │   │  cart_discount  │   │  is_free_item   │       │
//! │  │  promotions[]   │   │  total_amount   │   │  position       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │   Warehouse     │   │   Category      │       │
//! │  │  username (uq)  │   │  owner_id (FK)  │   │  name           │       │
//! │  │  role           │   │  location       │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Request records (`PlaceOrderRequest`, `AdjustStockRequest`, `New*`) are
//! the typed inputs callers deserialize from their transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::promotion::Promotion;
use crate::stock::{StockDirection, StockSubType};

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `quantity` and `reserved_quantity` mirror the product's default stock row
/// (no warehouse); zero when no such row exists.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub category_id: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,

    /// Loaded separately, in storage order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub promotions: Vec<Promotion>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether `requested` units can be sold from the default location.
    #[inline]
    pub fn has_stock_for(&self, requested: i64) -> bool {
        self.quantity >= requested
    }
}

/// Input for creating or updating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub category_id: Option<String>,
}

// =============================================================================
// Category
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// Access level of a user. Enforcement belongs to the caller's auth layer.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

/// The acting principal for orders and stock movements.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: UserRole,

    /// Opaque hash produced by the auth layer; never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    pub password_hash: String,
}

// =============================================================================
// Warehouse
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub location: String,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub owner_id: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid. Recorded on the order; no tender handling here.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    EWallet,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::EWallet => "e_wallet",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A committed order.
///
/// ## Totals
/// ```text
/// gross_total          Σ price × quantity        (paid lines only)
/// item_discount_total  Σ item_discount           (paid lines only)
/// sub_total            gross_total − item_discount_total
/// cart_discount        cart promotion, ≤ sub_total
/// total_amount         sub_total − cart_discount
/// ```
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub payment_method: PaymentMethod,
    pub gross_total_cents: i64,
    pub item_discount_total_cents: i64,
    pub sub_total_cents: i64,
    pub cart_discount_cents: i64,
    pub total_amount_cents: i64,

    /// Loaded separately, in request order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<OrderItem>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    pub fn sub_total(&self) -> Money {
        Money::from_cents(self.sub_total_cents)
    }
}

/// One line of a committed order.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Zero-based position within the order.
    pub position: i64,
    pub quantity: i64,
    /// List unit price at the time of sale.
    pub price_cents: i64,
    /// Line total after the item promotion.
    pub discounted_price_cents: i64,
    pub item_discount_cents: i64,
    pub is_free_item: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Requests
// =============================================================================

/// One product/quantity pair within an order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Checkout input. `user_id` comes from the caller's verified identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub payment_method: PaymentMethod,
    pub user_id: String,
    pub items: Vec<OrderLineRequest>,
}

/// Direct stock movement input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: String,
    #[serde(default)]
    pub warehouse_id: Option<String>,
    pub quantity: i64,
    #[serde(rename = "type")]
    pub direction: StockDirection,
    pub sub_type: StockSubType,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_request_wire_format() {
        let json = r#"{
            "payment_method": "bank_transfer",
            "user_id": "u-1",
            "items": [{"product_id": "p-1", "quantity": 2}]
        }"#;
        let req: PlaceOrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(req.items[0].quantity, 2);
    }

    #[test]
    fn test_adjust_stock_request_wire_format() {
        let json = r#"{
            "product_id": "p-1",
            "quantity": 5,
            "type": "in",
            "sub_type": "purchase"
        }"#;
        let req: AdjustStockRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.direction, StockDirection::In);
        assert_eq!(req.sub_type, StockSubType::Purchase);
        assert!(req.warehouse_id.is_none());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u-1".into(),
            username: "cashier".into(),
            name: "Cashier".into(),
            role: UserRole::User,
            password_hash: "secret".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
