//! # Services
//!
//! The two transactional operations. Each owns its transaction from BEGIN
//! to COMMIT; repositories only ever run inside one.
//!
//! - [`CheckoutService`] - `place_order`
//! - [`StockLedger`] - `adjust_stock`

pub mod checkout;
pub mod error;
pub mod ledger;

pub use checkout::CheckoutService;
pub use error::{OrderError, StockError};
pub use ledger::{apply_movement, StockLedger};
