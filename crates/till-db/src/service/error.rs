//! # Service Errors
//!
//! Terminal results of the two transactional operations.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ──► InvalidRequest        (before any side effect)    │
//! │  CoreError       ──► NotFound / InsufficientStock variants             │
//! │  DbError         ──► PersistenceFailure    (logged with error!)        │
//! │                                                                         │
//! │  StockError ──► OrderError   when checkout debits through the ledger   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use tracing::error;

use crate::error::DbError;
use till_core::{CoreError, ErrorKind, ValidationError};

// =============================================================================
// Order Error
// =============================================================================

/// Why `place_order` failed. Nothing was written in every case.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid order request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The free product of a buy-X-get-Y promotion no longer exists.
    #[error("Promotion get product not found: {0}")]
    GetProductNotFound(String),

    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Order could not be persisted: {0}")]
    PersistenceFailure(DbError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidRequest(e) => e.kind(),
            OrderError::ProductNotFound(_) | OrderError::GetProductNotFound(_) => ErrorKind::NotFound,
            OrderError::InsufficientStock { .. } => ErrorKind::Conflict,
            OrderError::PersistenceFailure(_) => ErrorKind::Persistence,
        }
    }

    /// Converts a failed line debit. A missing stock row means nothing is
    /// on hand, so it reads as insufficient stock for the line.
    pub(crate) fn from_debit(err: StockError, requested: i64) -> Self {
        match err {
            StockError::InvalidRequest(e) => OrderError::InvalidRequest(e),
            StockError::ProductNotFound(id) => OrderError::ProductNotFound(id),
            StockError::StockNotFound { product_id } => OrderError::InsufficientStock {
                product_id,
                available: 0,
                requested,
            },
            StockError::InsufficientStock {
                product_id,
                available,
                requested,
            } => OrderError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StockError::WarehouseNotFound(id) => OrderError::PersistenceFailure(DbError::not_found("Warehouse", id)),
            StockError::PersistenceFailure(e) => OrderError::PersistenceFailure(e),
        }
    }
}

impl From<DbError> for OrderError {
    fn from(err: DbError) -> Self {
        error!(error = %err, "Order persistence failure");
        OrderError::PersistenceFailure(err)
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for OrderError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => OrderError::InvalidRequest(e),
            CoreError::ProductNotFound(id) => OrderError::ProductNotFound(id),
            CoreError::GetProductNotFound(id) => OrderError::GetProductNotFound(id),
            CoreError::StockNotFound { product_id } => OrderError::InsufficientStock {
                product_id,
                available: 0,
                requested: 0,
            },
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => OrderError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            other @ (CoreError::WarehouseNotFound(_) | CoreError::InvalidPromotion { .. }) => {
                DbError::from(other).into()
            }
        }
    }
}

// =============================================================================
// Stock Error
// =============================================================================

/// Why `adjust_stock` failed. The stock row and the log are unchanged.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Invalid stock request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(String),

    /// An outbound movement found no stock row to draw from.
    #[error("Stock not found for product {product_id}")]
    StockNotFound { product_id: String },

    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Stock movement could not be persisted: {0}")]
    PersistenceFailure(DbError),
}

impl StockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::InvalidRequest(e) => e.kind(),
            StockError::ProductNotFound(_) | StockError::WarehouseNotFound(_) | StockError::StockNotFound { .. } => {
                ErrorKind::NotFound
            }
            StockError::InsufficientStock { .. } => ErrorKind::Conflict,
            StockError::PersistenceFailure(_) => ErrorKind::Persistence,
        }
    }
}

impl From<DbError> for StockError {
    fn from(err: DbError) -> Self {
        error!(error = %err, "Stock persistence failure");
        StockError::PersistenceFailure(err)
    }
}

impl From<sqlx::Error> for StockError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for StockError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => StockError::InvalidRequest(e),
            CoreError::ProductNotFound(id) | CoreError::GetProductNotFound(id) => StockError::ProductNotFound(id),
            CoreError::WarehouseNotFound(id) => StockError::WarehouseNotFound(id),
            CoreError::StockNotFound { product_id } => StockError::StockNotFound { product_id },
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => StockError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            other @ CoreError::InvalidPromotion { .. } => DbError::from(other).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(OrderError::ProductNotFound("p".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            OrderError::InsufficientStock {
                product_id: "p".into(),
                available: 1,
                requested: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            StockError::PersistenceFailure(DbError::PoolExhausted).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            StockError::InvalidRequest(ValidationError::MustBePositive {
                field: "quantity".into()
            })
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_missing_stock_row_reads_as_insufficient() {
        let err = OrderError::from_debit(
            StockError::StockNotFound {
                product_id: "p-1".into(),
            },
            4,
        );
        assert!(matches!(
            err,
            OrderError::InsufficientStock { available: 0, requested: 4, .. }
        ));
    }

    #[test]
    fn test_core_errors_map_to_stock_variants() {
        let err: StockError = CoreError::InsufficientStock {
            product_id: "p-1".into(),
            available: 2,
            requested: 5,
        }
        .into();
        assert!(matches!(err, StockError::InsufficientStock { available: 2, .. }));

        let err: StockError = CoreError::WarehouseNotFound("w-1".into()).into();
        assert!(matches!(err, StockError::WarehouseNotFound(_)));
    }
}
