//! # Stock Ledger
//!
//! Every change to on-hand quantity goes through here: a locked
//! read-modify-write of one stock row plus an append to the immutable
//! transaction log, committed together.
//!
//! ## Adjustment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust_stock(user_id, request)                                         │
//! │       │                                                                 │
//! │       ├── validate_adjust_stock()          → InvalidRequest             │
//! │       │                                                                 │
//! │  BEGIN                                                                  │
//! │       ├── lock_for_update(key)             ← blocks competing writers   │
//! │       ├── product exists?                  → ProductNotFound            │
//! │       ├── warehouse exists? (if given)     → WarehouseNotFound          │
//! │       ├── plan_movement(current, movement)                              │
//! │       │     no row + in   → create row                                 │
//! │       │     no row + out  → StockNotFound                              │
//! │       │     qty ± amount < 0 → InsufficientStock                        │
//! │       ├── insert_level / write_level                                    │
//! │       └── append_transaction                                            │
//! │  COMMIT  (lock released)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any early return drops the `sqlx::Transaction`, which rolls back.
//!
//! ## Reuse From Checkout
//! [`apply_movement`] is the same algorithm without its own transaction,
//! generic over [`StockStore`]. Checkout calls it once per order line on its
//! own transaction.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::repository::{product, warehouse};
use crate::service::error::StockError;
use crate::store::StockStore;
use till_core::stock::{plan_movement, MovementPlan};
use till_core::validation::validate_adjust_stock;
use till_core::{AdjustStockRequest, StockKey, StockLevel, StockMovement, StockTransaction};

/// Direct stock adjustments (receiving, write-offs, corrections).
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Applies one movement and returns its ledger entry.
    pub async fn adjust_stock(
        &self,
        user_id: &str,
        request: &AdjustStockRequest,
    ) -> Result<StockTransaction, StockError> {
        self.adjust_stock_at(user_id, request, Utc::now()).await
    }

    /// [`adjust_stock`](Self::adjust_stock) with an explicit timestamp.
    pub async fn adjust_stock_at(
        &self,
        user_id: &str,
        request: &AdjustStockRequest,
        now: DateTime<Utc>,
    ) -> Result<StockTransaction, StockError> {
        validate_adjust_stock(user_id, request)?;

        let movement = StockMovement {
            key: StockKey {
                product_id: request.product_id.clone(),
                warehouse_id: request.warehouse_id.clone(),
            },
            user_id: user_id.to_string(),
            quantity: request.quantity,
            direction: request.direction,
            sub_type: request.sub_type,
            notes: request.notes.clone(),
        };

        let mut tx = self.pool.begin().await?;

        // Lock before any read so the checks below see the committed state
        let current = StockStore::lock_for_update(&mut *tx, &movement.key).await?;

        if product::fetch(&mut *tx, &movement.key.product_id).await?.is_none() {
            warn!(product_id = %movement.key.product_id, "Stock adjustment for unknown product");
            return Err(StockError::ProductNotFound(movement.key.product_id));
        }

        if let Some(warehouse_id) = &movement.key.warehouse_id {
            if !warehouse::exists(&mut *tx, warehouse_id).await? {
                warn!(warehouse_id = %warehouse_id, "Stock adjustment for unknown warehouse");
                return Err(StockError::WarehouseNotFound(warehouse_id.clone()));
            }
        }

        let entry = apply_locked(&mut *tx, current, &movement, now).await?;

        tx.commit().await?;

        info!(
            product_id = %entry.product_id,
            warehouse_id = ?movement.key.warehouse_id,
            direction = %entry.direction,
            sub_type = %entry.sub_type,
            quantity = entry.quantity,
            "Stock adjusted"
        );

        Ok(entry)
    }
}

/// Locks the movement's row, then applies it. Runs entirely inside the
/// caller's transaction; nothing is committed here.
pub async fn apply_movement<S>(
    store: &mut S,
    movement: &StockMovement,
    now: DateTime<Utc>,
) -> Result<StockTransaction, StockError>
where
    S: StockStore + ?Sized,
{
    let current = store.lock_for_update(&movement.key).await?;
    apply_locked(store, current, movement, now).await
}

async fn apply_locked<S>(
    store: &mut S,
    current: Option<StockLevel>,
    movement: &StockMovement,
    now: DateTime<Utc>,
) -> Result<StockTransaction, StockError>
where
    S: StockStore + ?Sized,
{
    let plan = plan_movement(current.as_ref(), movement).map_err(|e| {
        warn!(product_id = %movement.key.product_id, error = %e, "Stock movement rejected");
        StockError::from(e)
    })?;

    debug!(
        product_id = %movement.key.product_id,
        resulting_quantity = plan.resulting_quantity(),
        "Applying stock movement"
    );

    let stock_id = match plan {
        MovementPlan::Create { quantity } => store.insert_level(&movement.key, quantity, now).await?.id,
        MovementPlan::Update { stock_id, quantity } => {
            store.write_level(&stock_id, quantity, now).await?;
            stock_id
        }
    };

    let entry = StockTransaction {
        id: Uuid::new_v4().to_string(),
        stock_id,
        product_id: movement.key.product_id.clone(),
        user_id: movement.user_id.clone(),
        quantity: movement.quantity,
        direction: movement.direction,
        sub_type: movement.sub_type,
        notes: movement.notes.clone(),
        created_at: now,
    };
    store.append_transaction(&entry).await?;

    Ok(entry)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbResult;
    use crate::{Database, DbConfig};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use till_core::{NewProduct, NewWarehouse, StockDirection, StockSubType};

    // -------------------------------------------------------------------------
    // In-memory store
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryStore {
        levels: HashMap<StockKey, StockLevel>,
        log: Vec<StockTransaction>,
    }

    #[async_trait]
    impl StockStore for MemoryStore {
        async fn lock_for_update(&mut self, key: &StockKey) -> DbResult<Option<StockLevel>> {
            Ok(self.levels.get(key).cloned())
        }

        async fn insert_level(&mut self, key: &StockKey, quantity: i64, now: DateTime<Utc>) -> DbResult<StockLevel> {
            let level = StockLevel {
                id: format!("s-{}", self.levels.len() + 1),
                product_id: key.product_id.clone(),
                warehouse_id: key.warehouse_id.clone(),
                quantity,
                reserved_quantity: 0,
                created_at: now,
                updated_at: now,
            };
            self.levels.insert(key.clone(), level.clone());
            Ok(level)
        }

        async fn write_level(&mut self, stock_id: &str, quantity: i64, now: DateTime<Utc>) -> DbResult<()> {
            if let Some(level) = self.levels.values_mut().find(|l| l.id == stock_id) {
                level.quantity = quantity;
                level.updated_at = now;
            }
            Ok(())
        }

        async fn append_transaction(&mut self, entry: &StockTransaction) -> DbResult<()> {
            self.log.push(entry.clone());
            Ok(())
        }
    }

    fn movement(direction: StockDirection, sub_type: StockSubType, quantity: i64) -> StockMovement {
        StockMovement {
            key: StockKey::default_location("p-1"),
            user_id: "u-1".into(),
            quantity,
            direction,
            sub_type,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_apply_movement_against_memory_store() {
        let mut store = MemoryStore::default();
        let now = Utc::now();

        apply_movement(&mut store, &movement(StockDirection::In, StockSubType::Purchase, 10), now)
            .await
            .unwrap();
        let out = apply_movement(&mut store, &movement(StockDirection::Out, StockSubType::Damaged, 4), now)
            .await
            .unwrap();

        let key = StockKey::default_location("p-1");
        assert_eq!(store.levels[&key].quantity, 6);
        assert_eq!(out.stock_id, store.levels[&key].id);
        assert_eq!(store.log.len(), 2);
        assert!(store.log.iter().all(|e| e.quantity > 0));
    }

    #[tokio::test]
    async fn test_rejected_movement_writes_nothing() {
        let mut store = MemoryStore::default();
        let now = Utc::now();

        let err = apply_movement(&mut store, &movement(StockDirection::Out, StockSubType::Sale, 1), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::StockNotFound { .. }));

        apply_movement(&mut store, &movement(StockDirection::In, StockSubType::Purchase, 3), now)
            .await
            .unwrap();
        let err = apply_movement(&mut store, &movement(StockDirection::Out, StockSubType::Sale, 5), now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StockError::InsufficientStock { available: 3, requested: 5, .. }
        ));
        assert_eq!(store.levels[&StockKey::default_location("p-1")].quantity, 3);
        assert_eq!(store.log.len(), 1);
    }

    // -------------------------------------------------------------------------
    // SQLite
    // -------------------------------------------------------------------------

    const USER: &str = "6f1c2b9e-2a4d-4c7a-9a31-0d6f1e2b3c4d";

    async fn product(db: &Database, sku: &str) -> String {
        db.products()
            .insert(&NewProduct {
                sku: sku.into(),
                name: format!("Product {sku}"),
                price_cents: 100,
                category_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn request(product_id: &str, direction: StockDirection, sub_type: StockSubType, quantity: i64) -> AdjustStockRequest {
        AdjustStockRequest {
            product_id: product_id.to_string(),
            warehouse_id: None,
            quantity,
            direction,
            sub_type,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_inbound_creates_row_and_logs() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product(&db, "A-1").await;

        let entry = db
            .ledger()
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Purchase, 12))
            .await
            .unwrap();
        assert_eq!(entry.quantity, 12);
        assert_eq!(entry.user_id, USER);

        let level = db.stock().get_level(&StockKey::default_location(&p)).await.unwrap().unwrap();
        assert_eq!(level.quantity, 12);
        assert_eq!(level.id, entry.stock_id);

        // The product projection reads the default-location row
        let loaded = db.products().get_by_id(&p).await.unwrap().unwrap();
        assert_eq!(loaded.quantity, 12);

        let log = db.stock().list_transactions(&p, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sub_type, StockSubType::Purchase);
    }

    #[tokio::test]
    async fn test_outbound_without_row_is_stock_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product(&db, "A-1").await;

        let err = db
            .ledger()
            .adjust_stock(USER, &request(&p, StockDirection::Out, StockSubType::Damaged, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::StockNotFound { .. }));
        assert_eq!(db.stock().count_transactions(&p).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_row_unchanged() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product(&db, "A-1").await;
        let ledger = db.ledger();

        ledger
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Purchase, 5))
            .await
            .unwrap();
        let err = ledger
            .adjust_stock(USER, &request(&p, StockDirection::Out, StockSubType::Expired, 6))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StockError::InsufficientStock { available: 5, requested: 6, .. }
        ));
        let level = db.stock().get_level(&StockKey::default_location(&p)).await.unwrap().unwrap();
        assert_eq!(level.quantity, 5);
        assert_eq!(db.stock().count_transactions(&p).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_adjustment_sub_type_works_both_ways() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product(&db, "A-1").await;
        let ledger = db.ledger();

        ledger
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Adjustment, 8))
            .await
            .unwrap();
        ledger
            .adjust_stock(USER, &request(&p, StockDirection::Out, StockSubType::Adjustment, 8))
            .await
            .unwrap();

        let level = db.stock().get_level(&StockKey::default_location(&p)).await.unwrap().unwrap();
        assert_eq!(level.quantity, 0);
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected_before_writing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product(&db, "A-1").await;
        let ledger = db.ledger();

        // inbound movement labelled as a sale
        let err = ledger
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Sale, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidRequest(_)));

        let err = ledger
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Purchase, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidRequest(_)));

        let err = ledger
            .adjust_stock("not-a-user", &request(&p, StockDirection::In, StockSubType::Purchase, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidRequest(_)));

        assert!(db.stock().list_levels(&p).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_and_warehouse() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.ledger();

        let missing = Uuid::new_v4().to_string();
        let err = ledger
            .adjust_stock(USER, &request(&missing, StockDirection::In, StockSubType::Purchase, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(ref id) if *id == missing));

        let p = product(&db, "A-1").await;
        let mut req = request(&p, StockDirection::In, StockSubType::Purchase, 1);
        req.warehouse_id = Some(Uuid::new_v4().to_string());
        let err = ledger.adjust_stock(USER, &req).await.unwrap_err();
        assert!(matches!(err, StockError::WarehouseNotFound(_)));
    }

    #[tokio::test]
    async fn test_warehouse_rows_are_separate_from_default() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product(&db, "A-1").await;
        let w = db
            .warehouses()
            .insert(&NewWarehouse {
                name: "Back Room".into(),
                location: "Store 1".into(),
                owner_id: None,
            })
            .await
            .unwrap();

        let mut req = request(&p, StockDirection::In, StockSubType::TransferIn, 7);
        req.warehouse_id = Some(w.id.clone());
        db.ledger().adjust_stock(USER, &req).await.unwrap();
        db.ledger()
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Purchase, 2))
            .await
            .unwrap();

        let levels = db.stock().list_levels(&p).await.unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].warehouse_id, None);
        assert_eq!(levels[0].quantity, 2);
        assert_eq!(levels[1].quantity, 7);

        // Product quantity tracks only the default location
        assert_eq!(db.products().get_by_id(&p).await.unwrap().unwrap().quantity, 2);
    }

    // -------------------------------------------------------------------------
    // Concurrency
    // -------------------------------------------------------------------------

    async fn file_database(dir: &tempfile::TempDir) -> Database {
        Database::new(DbConfig::new(dir.path().join("ledger.db")).max_connections(8))
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_outbound_never_oversells() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_database(&dir).await;
        let p = product(&db, "HOT-1").await;
        db.ledger()
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Purchase, 50))
            .await
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let ledger = db.ledger();
                let req = request(&p, StockDirection::Out, StockSubType::Sale, 5);
                tokio::spawn(async move { ledger.adjust_stock(USER, &req).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(StockError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 10);
        let level = db.stock().get_level(&StockKey::default_location(&p)).await.unwrap().unwrap();
        assert_eq!(level.quantity, 0);
        assert_eq!(db.stock().count_transactions(&p).await.unwrap(), 11);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_movements_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_database(&dir).await;
        let p = product(&db, "HOT-2").await;
        db.ledger()
            .adjust_stock(USER, &request(&p, StockDirection::In, StockSubType::Purchase, 50))
            .await
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let ledger = db.ledger();
                let req = if i % 2 == 0 {
                    request(&p, StockDirection::In, StockSubType::Return, 3)
                } else {
                    request(&p, StockDirection::Out, StockSubType::Sale, 3)
                };
                tokio::spawn(async move { ledger.adjust_stock(USER, &req).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let level = db.stock().get_level(&StockKey::default_location(&p)).await.unwrap().unwrap();
        assert_eq!(level.quantity, 50);
    }
}
