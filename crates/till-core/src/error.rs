//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Four-way taxonomy every error maps onto        │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  ├── DbError          - Database operation failures                    │
//! │  ├── OrderError       - Terminal result of place_order                 │
//! │  └── StockError       - Terminal result of adjust_stock                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OrderError/StockError → caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities)
//! 3. Errors are enum variants, never String
//! 4. Every error answers `kind()` so callers can map it to a status code

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification shared by every error in the workspace.
///
/// ```text
/// Validation   → 400-style: the request itself is wrong
/// NotFound     → 404-style: a referenced entity does not exist
/// Conflict     → 409-style: the request is well formed but the state forbids it
/// Persistence  → 500-style: the store failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (missing or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The "get" product of a buy-X-get-Y promotion cannot be found.
    #[error("Promotion get product not found: {0}")]
    GetProductNotFound(String),

    /// Warehouse cannot be found.
    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(String),

    /// No stock row exists for the key and the movement cannot create one.
    #[error("Stock not found for product {product_id}")]
    StockNotFound { product_id: String },

    /// Insufficient stock to complete the movement.
    ///
    /// ## User Workflow
    /// ```text
    /// Order line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole order rolls back, nothing is debited
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A promotion row does not carry the fields its type requires.
    #[error("Invalid promotion: {reason}")]
    InvalidPromotion { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_)
            | CoreError::GetProductNotFound(_)
            | CoreError::WarehouseNotFound(_)
            | CoreError::StockNotFound { .. } => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. } => ErrorKind::Conflict,
            CoreError::InvalidPromotion { .. } => ErrorKind::Validation,
            CoreError::Validation(e) => e.kind(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary, before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, inverted date window).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU or username).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Duplicates are conflicts; everything else is a malformed request.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Duplicate { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for p-1: available 3, requested 5"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::ProductNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::StockNotFound {
                product_id: "x".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::InsufficientStock {
                product_id: "x".into(),
                available: 0,
                requested: 1
            }
            .kind(),
            ErrorKind::Conflict
        );

        let dup: CoreError = ValidationError::Duplicate {
            field: "sku".into(),
            value: "A-1".into(),
        }
        .into();
        assert_eq!(dup.kind(), ErrorKind::Conflict);

        let missing: CoreError = ValidationError::Required {
            field: "items".into(),
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_kind_display_matches_serde() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(
            serde_json::to_string(&ErrorKind::Persistence).unwrap(),
            "\"persistence\""
        );
    }
}
