//! # Repository Module
//!
//! Database repository implementations for Till POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Kinds of Access                                  │
//! │                                                                         │
//! │  Pool-backed methods (admin, reporting)                                │
//! │       db.products().insert(&new_product)                               │
//! │       │                                                                 │
//! │       ▼  one statement, auto-commit                                     │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Connection-scoped fns (checkout, ledger)                              │
//! │       product::fetch_with_promotions(&mut *tx, id)                     │
//! │       order::insert_shell(&mut *tx, …)                                 │
//! │       │                                                                 │
//! │       ▼  runs inside the caller's transaction                          │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product CRUD, promotion-aware loading
//! - [`PromotionRepository`] - Product promotions
//! - [`CartPromotionRepository`] - Cart-level promotions
//! - [`CategoryRepository`] - Categories
//! - [`UserRepository`] - Users (acting principals)
//! - [`WarehouseRepository`] - Warehouses
//! - [`OrderRepository`] - Order reads and persistence
//! - [`StockRepository`] - Stock levels and the transaction log

pub mod cart_promotion;
pub mod category;
pub mod order;
pub mod product;
pub mod promotion;
pub mod stock;
pub mod user;
pub mod warehouse;

pub use cart_promotion::CartPromotionRepository;
pub use category::CategoryRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use promotion::PromotionRepository;
pub use stock::StockRepository;
pub use user::UserRepository;
pub use warehouse::WarehouseRepository;
