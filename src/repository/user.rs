//! User repository

use super::{conflict_on_duplicate, MySqlDb};
use crate::context::Context;
use crate::domain::{Role, StringUuid, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;

/// Row to insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct CreateUserRecord {
    pub username: String,
    pub role: Role,
    pub password_hash: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, ctx: &Context, input: &CreateUserRecord) -> Result<User>;
    /// Live principals only; soft-deleted rows are invisible.
    async fn find_by_id(&self, ctx: &Context, id: StringUuid) -> Result<Option<User>>;
    async fn find_by_username(&self, ctx: &Context, username: &str) -> Result<Option<User>>;
    async fn update_password(&self, ctx: &Context, id: StringUuid, password_hash: &str)
        -> Result<()>;
}

pub struct UserRepositoryImpl {
    db: MySqlDb,
}

impl UserRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn create(&self, ctx: &Context, input: &CreateUserRecord) -> Result<User> {
        let id = StringUuid::new_v4();
        {
            let mut conn = self.db.acquire(ctx).await?;
            sqlx::query(
                r#"
                INSERT INTO users (id, username, role, password_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, NOW(), NOW())
                "#,
            )
            .bind(id)
            .bind(&input.username)
            .bind(input.role)
            .bind(&input.password_hash)
            .execute(&mut *conn)
            .await
            .map_err(|e| conflict_on_duplicate(e, "username"))?;
        }

        self.find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create user")))
    }

    async fn find_by_id(&self, ctx: &Context, id: StringUuid) -> Result<Option<User>> {
        let mut conn = self.db.acquire(ctx).await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, role, password_hash, created_at, deleted_at
            FROM users
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, ctx: &Context, username: &str) -> Result<Option<User>> {
        let mut conn = self.db.acquire(ctx).await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, role, password_hash, created_at, deleted_at
            FROM users
            WHERE username = ? AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    async fn update_password(
        &self,
        ctx: &Context,
        id: StringUuid,
        password_hash: &str,
    ) -> Result<()> {
        let mut conn = self.db.acquire(ctx).await?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = NOW()
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }
}
