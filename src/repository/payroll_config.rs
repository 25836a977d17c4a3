//! Payroll configuration repository

use super::{conflict_on_duplicate, MySqlDb};
use crate::context::Context;
use crate::domain::{PayrollConfig, StringUuid};
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayrollConfigRepository: Send + Sync {
    async fn create(&self, ctx: &Context, config: &PayrollConfig) -> Result<()>;
    async fn find_by_company(
        &self,
        ctx: &Context,
        company_id: StringUuid,
    ) -> Result<Option<PayrollConfig>>;
}

pub struct PayrollConfigRepositoryImpl {
    db: MySqlDb,
}

impl PayrollConfigRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PayrollConfigRepository for PayrollConfigRepositoryImpl {
    async fn create(&self, ctx: &Context, config: &PayrollConfig) -> Result<()> {
        let mut conn = self.db.acquire(ctx).await?;
        sqlx::query(
            r#"
            INSERT INTO payroll_configs (company_id, pay_day, currency, created_at, updated_at)
            VALUES (?, ?, ?, ?, NOW())
            "#,
        )
        .bind(config.company_id)
        .bind(config.pay_day)
        .bind(&config.currency)
        .bind(config.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_on_duplicate(e, "payroll config"))?;

        Ok(())
    }

    async fn find_by_company(
        &self,
        ctx: &Context,
        company_id: StringUuid,
    ) -> Result<Option<PayrollConfig>> {
        let mut conn = self.db.acquire(ctx).await?;
        let config = sqlx::query_as::<_, PayrollConfig>(
            r#"
            SELECT company_id, pay_day, currency, created_at
            FROM payroll_configs
            WHERE company_id = ?
            "#,
        )
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(config)
    }
}
