//! Refresh credential repository

use super::MySqlDb;
use crate::context::Context;
use crate::domain::{RefreshToken, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken>;
    async fn find_by_hash(&self, ctx: &Context, token_hash: &str) -> Result<Option<RefreshToken>>;
    /// Sets `revoked_at` when unset. Returns whether this call revoked it.
    async fn revoke(&self, ctx: &Context, token_hash: &str) -> Result<bool>;
}

pub struct RefreshTokenRepositoryImpl {
    db: MySqlDb,
}

impl RefreshTokenRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenRepository for RefreshTokenRepositoryImpl {
    async fn create(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let id = StringUuid::new_v4();
        {
            let mut conn = self.db.acquire(ctx).await?;
            sqlx::query(
                r#"
                INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
                VALUES (?, ?, ?, ?, NOW())
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&mut *conn)
            .await?;
        }

        self.find_by_hash(ctx, token_hash)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to persist refresh token")))
    }

    async fn find_by_hash(&self, ctx: &Context, token_hash: &str) -> Result<Option<RefreshToken>> {
        let mut conn = self.db.acquire(ctx).await?;
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(token)
    }

    async fn revoke(&self, ctx: &Context, token_hash: &str) -> Result<bool> {
        let mut conn = self.db.acquire(ctx).await?;
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_hash = ? AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
