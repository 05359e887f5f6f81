//! # Stock Arithmetic
//!
//! Directions, sub-types and the pure half of the Stock Ledger: given the
//! current stock row (or its absence) and a requested movement, decide what
//! the row must become.
//!
//! ## Movement Planning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     plan_movement(current, movement)                    │
//! │                                                                         │
//! │  current row?  ──No──► direction In  ──► Create { quantity: amount }   │
//! │       │                direction Out ──► Err(StockNotFound)            │
//! │      Yes                                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  new = quantity ± amount                                               │
//! │       │                                                                 │
//! │       ├── new < 0 ──► Err(InsufficientStock)                           │
//! │       └── new ≥ 0 ──► Update { quantity: new }                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database half (locking, writing, appending the transaction log) lives
//! in `till-db::service::ledger` and calls [`plan_movement`] while it holds
//! the lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Direction
// =============================================================================

/// Which way stock moves.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    /// Applies `amount` to `current`; `None` when the result would be negative.
    ///
    /// ```rust
    /// use till_core::StockDirection;
    ///
    /// assert_eq!(StockDirection::In.apply(5, 3), Some(8));
    /// assert_eq!(StockDirection::Out.apply(5, 3), Some(2));
    /// assert_eq!(StockDirection::Out.apply(2, 3), None);
    /// ```
    pub fn apply(self, current: i64, amount: i64) -> Option<i64> {
        let next = match self {
            StockDirection::In => current.checked_add(amount)?,
            StockDirection::Out => current.checked_sub(amount)?,
        };
        (next >= 0).then_some(next)
    }
}

impl fmt::Display for StockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockDirection::In => f.write_str("in"),
            StockDirection::Out => f.write_str("out"),
        }
    }
}

// =============================================================================
// Sub-Type
// =============================================================================

/// Why stock moved.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSubType {
    Purchase,
    Return,
    TransferIn,
    Sale,
    Damaged,
    Expired,
    TransferOut,
    /// Stocktake correction, either direction.
    Adjustment,
}

impl StockSubType {
    pub const ALL: [StockSubType; 8] = [
        StockSubType::Purchase,
        StockSubType::Return,
        StockSubType::TransferIn,
        StockSubType::Sale,
        StockSubType::Damaged,
        StockSubType::Expired,
        StockSubType::TransferOut,
        StockSubType::Adjustment,
    ];

    /// Whether this reason can accompany a movement in `direction`.
    pub fn is_compatible_with(self, direction: StockDirection) -> bool {
        match self {
            StockSubType::Purchase | StockSubType::Return | StockSubType::TransferIn => {
                direction == StockDirection::In
            }
            StockSubType::Sale
            | StockSubType::Damaged
            | StockSubType::Expired
            | StockSubType::TransferOut => direction == StockDirection::Out,
            StockSubType::Adjustment => true,
        }
    }

    /// Sub-types allowed for `direction`, as wire strings.
    pub fn allowed_for(direction: StockDirection) -> Vec<String> {
        Self::ALL
            .iter()
            .filter(|s| s.is_compatible_with(direction))
            .map(|s| s.to_string())
            .collect()
    }
}

impl fmt::Display for StockSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StockSubType::Purchase => "purchase",
            StockSubType::Return => "return",
            StockSubType::TransferIn => "transfer_in",
            StockSubType::Sale => "sale",
            StockSubType::Damaged => "damaged",
            StockSubType::Expired => "expired",
            StockSubType::TransferOut => "transfer_out",
            StockSubType::Adjustment => "adjustment",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Identifies one stock row. `warehouse_id = None` is the product's default
/// location, the one `Product.quantity` reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: String,
    pub warehouse_id: Option<String>,
}

impl StockKey {
    /// The default-location key for a product.
    pub fn default_location(product_id: impl Into<String>) -> Self {
        StockKey {
            product_id: product_id.into(),
            warehouse_id: None,
        }
    }

    pub fn in_warehouse(product_id: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        StockKey {
            product_id: product_id.into(),
            warehouse_id: Some(warehouse_id.into()),
        }
    }
}

/// Authoritative on-hand quantity for a (product, warehouse) pair.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id.clone(),
            warehouse_id: self.warehouse_id.clone(),
        }
    }
}

/// Append-only ledger entry. `quantity` is always positive; the sign lives
/// in `direction`.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: String,
    pub stock_id: String,
    pub product_id: String,
    pub user_id: String,
    pub quantity: i64,
    pub direction: StockDirection,
    pub sub_type: StockSubType,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A requested change to one stock row.
#[derive(Debug, Clone, PartialEq)]
pub struct StockMovement {
    pub key: StockKey,
    pub user_id: String,
    pub quantity: i64,
    pub direction: StockDirection,
    pub sub_type: StockSubType,
    pub notes: Option<String>,
}

impl StockMovement {
    /// The debit recorded for one order line.
    pub fn sale(
        product_id: impl Into<String>,
        user_id: impl Into<String>,
        quantity: i64,
        order_id: &str,
    ) -> Self {
        StockMovement {
            key: StockKey::default_location(product_id),
            user_id: user_id.into(),
            quantity,
            direction: StockDirection::Out,
            sub_type: StockSubType::Sale,
            notes: Some(format!("Sale for order {}", order_id)),
        }
    }
}

// =============================================================================
// Planning
// =============================================================================

/// What the locked stock row must become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementPlan {
    /// No row existed; create one holding `quantity`.
    Create { quantity: i64 },
    /// Overwrite the quantity of row `stock_id`.
    Update { stock_id: String, quantity: i64 },
}

impl MovementPlan {
    pub fn resulting_quantity(&self) -> i64 {
        match self {
            MovementPlan::Create { quantity } | MovementPlan::Update { quantity, .. } => *quantity,
        }
    }
}

/// Decides the effect of `movement` on `current`.
///
/// Must be called while the caller holds the lock on `current`'s row,
/// otherwise the plan is stale by the time it is written.
pub fn plan_movement(current: Option<&StockLevel>, movement: &StockMovement) -> CoreResult<MovementPlan> {
    match current {
        None => match movement.direction {
            StockDirection::In => Ok(MovementPlan::Create {
                quantity: movement.quantity,
            }),
            StockDirection::Out => Err(CoreError::StockNotFound {
                product_id: movement.key.product_id.clone(),
            }),
        },
        Some(level) => movement
            .direction
            .apply(level.quantity, movement.quantity)
            .map(|quantity| MovementPlan::Update {
                stock_id: level.id.clone(),
                quantity,
            })
            .ok_or_else(|| CoreError::InsufficientStock {
                product_id: movement.key.product_id.clone(),
                available: level.quantity,
                requested: movement.quantity,
            }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
