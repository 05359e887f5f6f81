//! Product categories.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::validation::validate_name;
use till_core::Category;

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE deleted_at IS NULL ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn insert(&self, name: &str) -> DbResult<Category> {
        validate_name(name, "name")?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query("INSERT INTO categories (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .bind(category.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    pub async fn rename(&self, id: &str, name: &str) -> DbResult<Category> {
        validate_name(name, "name")?;

        let result = sqlx::query(
            "UPDATE categories SET name = ?2, updated_at = ?3 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(name.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Soft-deletes a category and detaches its products.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting category");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE categories SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        sqlx::query("UPDATE products SET category_id = NULL, updated_at = ?2 WHERE category_id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use till_core::NewProduct;

    #[tokio::test]
    async fn test_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let drinks = repo.insert("  Drinks ").await.unwrap();
        assert_eq!(drinks.name, "Drinks");
        repo.insert("Bakery").await.unwrap();

        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Bakery", "Drinks"]);

        let renamed = repo.rename(&drinks.id, "Beverages").await.unwrap();
        assert_eq!(renamed.name, "Beverages");

        assert!(repo.insert("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_detaches_products() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let drinks = db.categories().insert("Drinks").await.unwrap();
        let cola = db
            .products()
            .insert(&NewProduct {
                sku: "COLA".into(),
                name: "Cola".into(),
                price_cents: 150,
                category_id: Some(drinks.id.clone()),
            })
            .await
            .unwrap();

        db.categories().soft_delete(&drinks.id).await.unwrap();

        assert!(db.categories().get_by_id(&drinks.id).await.unwrap().is_none());
        let cola = db.products().get_by_id(&cola.id).await.unwrap().unwrap();
        assert_eq!(cola.category_id, None);
    }
}
