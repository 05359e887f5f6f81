//! # till-db: Database Layer for Till POS
//!
//! SQLite persistence for Till POS, plus the two transactional services
//! that need it: order checkout and the Stock Ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Data Flow                               │
//! │                                                                         │
//! │  HTTP handler / binary (owns the verified user_id)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐   │   │
//! │  │   │   Services    │   │  Repositories  │   │  StockStore   │   │   │
//! │  │   │ CheckoutSvc   │──►│ product, order │   │ lock_for_     │   │   │
//! │  │   │ StockLedger   │──►│ promotion, …   │   │   update()    │   │   │
//! │  │   └───────┬───────┘   └────────────────┘   └───────▲───────┘   │   │
//! │  │           └────────────────────────────────────────┘           │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs)   TillConfig (config.rs)   migrations     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── ./till.db or TILL_DB_PATH                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pricing rules live in `till-core`; nothing here decides a price.
//!
//! ## Module Organization
//!
//! - [`config`] - TOML/env configuration and tracing setup
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - The stock row locking capability
//! - [`repository`] - Repository implementations
//! - [`service`] - Checkout and the Stock Ledger
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, TillConfig};
//!
//! let config = TillConfig::load(None)?;
//! config.init_tracing();
//!
//! let db = Database::new(config.db_config()).await?;
//! let order = db.checkout().place_order(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, TillConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use service::{CheckoutService, OrderError, StockError, StockLedger};
pub use store::StockStore;

// Repository re-exports for convenience
pub use repository::{
    CartPromotionRepository, CategoryRepository, OrderRepository, ProductRepository, PromotionRepository,
    StockRepository, UserRepository, WarehouseRepository,
};
