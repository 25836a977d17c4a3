//! Company repository

use super::{conflict_on_duplicate, MySqlDb};
use crate::context::Context;
use crate::domain::{Company, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn create(&self, ctx: &Context, name: &str) -> Result<Company>;
    async fn find_by_id(&self, ctx: &Context, id: StringUuid) -> Result<Option<Company>>;
}

pub struct CompanyRepositoryImpl {
    db: MySqlDb,
}

impl CompanyRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CompanyRepository for CompanyRepositoryImpl {
    async fn create(&self, ctx: &Context, name: &str) -> Result<Company> {
        let id = StringUuid::new_v4();
        {
            let mut conn = self.db.acquire(ctx).await?;
            sqlx::query("INSERT INTO companies (id, name, created_at) VALUES (?, ?, NOW())")
                .bind(id)
                .bind(name)
                .execute(&mut *conn)
                .await
                .map_err(|e| conflict_on_duplicate(e, "company"))?;
        }

        self.find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create company")))
    }

    async fn find_by_id(&self, ctx: &Context, id: StringUuid) -> Result<Option<Company>> {
        let mut conn = self.db.acquire(ctx).await?;
        let company = sqlx::query_as::<_, Company>(
            "SELECT id, name, created_at FROM companies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(company)
    }
}
