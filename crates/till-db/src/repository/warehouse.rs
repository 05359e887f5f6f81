//! Warehouses: named stock locations, optionally owned by a user.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::validation::validate_new_warehouse;
use till_core::{NewWarehouse, Warehouse};

const WAREHOUSE_COLUMNS: &str = "id, name, location, owner_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    pool: SqlitePool,
}

impl WarehouseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WarehouseRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn list(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE deleted_at IS NULL ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    /// Inserts a warehouse. An unknown `owner_id` is a foreign key violation.
    pub async fn insert(&self, input: &NewWarehouse) -> DbResult<Warehouse> {
        validate_new_warehouse(input)?;

        let now = Utc::now();
        let warehouse = Warehouse {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            location: input.location.trim().to_string(),
            owner_id: input.owner_id.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %warehouse.id, name = %warehouse.name, "Inserting warehouse");

        sqlx::query(&format!(
            "INSERT INTO warehouses ({WAREHOUSE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ))
        .bind(&warehouse.id)
        .bind(&warehouse.name)
        .bind(&warehouse.location)
        .bind(&warehouse.owner_id)
        .bind(warehouse.created_at)
        .bind(warehouse.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn update(&self, id: &str, input: &NewWarehouse) -> DbResult<Warehouse> {
        validate_new_warehouse(input)?;

        let result = sqlx::query(
            r#"
            UPDATE warehouses
            SET name = ?2, location = ?3, owner_id = ?4, updated_at = ?5
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.location.trim())
        .bind(&input.owner_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Warehouse", id))
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting warehouse");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE warehouses SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }
        Ok(())
    }
}

/// Whether a live warehouse exists, checked on the caller's connection.
pub(crate) async fn exists(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM warehouses WHERE id = ?1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn back_room() -> NewWarehouse {
        NewWarehouse {
            name: "Back Room".into(),
            location: "Store 1".into(),
            owner_id: None,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.warehouses().insert(&back_room()).await.unwrap();

        let updated = db
            .warehouses()
            .update(
                &created.id,
                &NewWarehouse {
                    location: "Store 2".into(),
                    ..back_room()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.location, "Store 2");
        assert_eq!(db.warehouses().list().await.unwrap().len(), 1);

        db.warehouses().soft_delete(&created.id).await.unwrap();
        assert!(db.warehouses().get_by_id(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_owner_is_foreign_key_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .warehouses()
            .insert(&NewWarehouse {
                owner_id: Some(Uuid::new_v4().to_string()),
                ..back_room()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
