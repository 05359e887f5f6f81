//! # User Repository
//!
//! Users are the acting principals recorded on orders and stock movements.
//! Password hashing and role enforcement belong to the auth layer; this
//! repository stores the hash it is given.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::validation::validate_new_user;
use till_core::{NewUser, User};

const USER_COLUMNS: &str = "id, username, name, role, password_hash, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 AND deleted_at IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Inserts a user. Usernames are unique among live users.
    pub async fn insert(&self, input: &NewUser) -> DbResult<User> {
        validate_new_user(input)?;

        if self.get_by_username(&input.username).await?.is_some() {
            return Err(DbError::duplicate("username", &input.username));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: input.username.clone(),
            name: input.name.trim().to_string(),
            role: input.role,
            password_hash: input.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %user.id, username = %user.username, "Inserting user");

        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ))
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", &input.username),
            other => other,
        })?;

        Ok(user)
    }

    /// Updates a live user's username, name, role and password hash.
    pub async fn update(&self, id: &str, input: &NewUser) -> DbResult<User> {
        validate_new_user(input)?;

        if let Some(existing) = self.get_by_username(&input.username).await? {
            if existing.id != id {
                return Err(DbError::duplicate("username", &input.username));
            }
        }

        debug!(id = %id, username = %input.username, "Updating user");

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?2, name = ?3, role = ?4, password_hash = ?5, updated_at = ?6
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&input.username)
        .bind(input.name.trim())
        .bind(input.role)
        .bind(&input.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", &input.username),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting user");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use till_core::{ErrorKind, UserRole};

    fn cashier() -> NewUser {
        NewUser {
            username: "cashier1".into(),
            name: "Front Till".into(),
            role: UserRole::User,
            password_hash: "$argon2id$stub".into(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.users().insert(&cashier()).await.unwrap();

        let by_name = db.users().get_by_username("cashier1").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.role, UserRole::User);
        assert_eq!(db.users().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users().insert(&cashier()).await.unwrap();

        let err = db.users().insert(&cashier()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_deleted_user_frees_username() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.users().insert(&cashier()).await.unwrap();
        db.users().soft_delete(&created.id).await.unwrap();

        assert!(db.users().get_by_id(&created.id).await.unwrap().is_none());
        db.users().insert(&cashier()).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_changes_role_and_keeps_username_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.users().insert(&cashier()).await.unwrap();
        let other = db
            .users()
            .insert(&NewUser {
                username: "manager".into(),
                ..cashier()
            })
            .await
            .unwrap();

        let stored = db.users().get_by_id(&created.id).await.unwrap().unwrap();
        let updated = db
            .users()
            .update(
                &created.id,
                &NewUser {
                    name: "Back Office".into(),
                    role: UserRole::Admin,
                    ..cashier()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Admin);
        assert_eq!(updated.name, "Back Office");
        assert_eq!(updated.created_at, stored.created_at);

        let err = db
            .users()
            .update(
                &other.id,
                &NewUser {
                    username: "cashier1".into(),
                    ..cashier()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        db.users().soft_delete(&other.id).await.unwrap();
        let ghost = NewUser {
            username: "ghost".into(),
            ..cashier()
        };
        let err = db.users().update(&other.id, &ghost).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
