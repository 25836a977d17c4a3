//! Branch repository

use super::{conflict_on_duplicate, MySqlDb};
use crate::context::Context;
use crate::domain::{Branch, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn create(&self, ctx: &Context, company_id: StringUuid, name: &str) -> Result<Branch>;
    async fn find_by_id(&self, ctx: &Context, id: StringUuid) -> Result<Option<Branch>>;
    async fn list_by_company(&self, ctx: &Context, company_id: StringUuid) -> Result<Vec<Branch>>;
}

pub struct BranchRepositoryImpl {
    db: MySqlDb,
}

impl BranchRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BranchRepository for BranchRepositoryImpl {
    async fn create(&self, ctx: &Context, company_id: StringUuid, name: &str) -> Result<Branch> {
        let id = StringUuid::new_v4();
        {
            let mut conn = self.db.acquire(ctx).await?;
            sqlx::query(
                r#"
                INSERT INTO branches (id, company_id, name, created_at)
                VALUES (?, ?, ?, NOW())
                "#,
            )
            .bind(id)
            .bind(company_id)
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| conflict_on_duplicate(e, "branch"))?;
        }

        self.find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create branch")))
    }

    async fn find_by_id(&self, ctx: &Context, id: StringUuid) -> Result<Option<Branch>> {
        let mut conn = self.db.acquire(ctx).await?;
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, company_id, name, created_at FROM branches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(branch)
    }

    async fn list_by_company(&self, ctx: &Context, company_id: StringUuid) -> Result<Vec<Branch>> {
        let mut conn = self.db.acquire(ctx).await?;
        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, company_id, name, created_at
            FROM branches
            WHERE company_id = ?
            ORDER BY name
            "#,
        )
        .bind(company_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(branches)
    }
}
