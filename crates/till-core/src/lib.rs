//! # till-core: Pure Business Logic for Till POS
//!
//! Everything that decides *what an order costs* and *whether stock may move*
//! lives here, as plain functions over plain data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Till POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          HTTP layer / CLI (outside this workspace)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ PlaceOrderRequest, AdjustStockRequest  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   till-db: CheckoutService, StockLedger, repositories           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌───────────┐ ┌─────────┐ ┌───────┐ ┌──────────┐ │   │
//! │  │  │  types   │ │ promotion │ │ pricing │ │ stock │ │validation│ │   │
//! │  │  │ Product  │ │ Resolver  │ │  Lines  │ │ Delta │ │  rules   │ │   │
//! │  │  │  Order   │ │  Windows  │ │ Totals  │ │ Keys  │ │  checks  │ │   │
//! │  │  └──────────┘ └───────────┘ └─────────┘ └───────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Order, User, Warehouse, requests)
//! - [`money`] - Integer money in cents
//! - [`promotion`] - Item and cart promotion resolution
//! - [`pricing`] - Order line pricing and totals aggregation
//! - [`stock`] - Stock directions, sub-types and delta arithmetic
//! - [`error`] - Domain error types and the error taxonomy
//! - [`validation`] - Boundary validation
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//!
//! // 10% off a 100.00 unit price
//! let unit = Money::from_cents(10_000);
//! assert_eq!(unit.apply_percentage_discount(1000).cents(), 9_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use pricing::{FinalTotals, FreeItemClaim, OrderItemDraft, OrderTotals, PricedLine};
pub use promotion::{
    CartPromotion, CartRule, ItemResolution, NewCartPromotion, NewPromotion, Promotion, PromotionRule,
    PromotionType,
};
pub use stock::{StockDirection, StockKey, StockLevel, StockMovement, StockSubType, StockTransaction};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single order request.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Catches fat-finger entries (1000 instead of 10) before stock is touched.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Upper bound for any price or money amount entered by an admin, in cents.
///
/// `MAX_PRICE_CENTS × MAX_ITEM_QUANTITY × MAX_ORDER_LINES` stays well inside
/// `i64`, so line and order totals cannot overflow.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000_000;

/// Upper bound for a single stock adjustment.
pub const MAX_ADJUSTMENT_QUANTITY: i64 = 1_000_000;
