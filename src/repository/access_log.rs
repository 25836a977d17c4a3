//! Login attempt log

use super::MySqlDb;
use crate::context::Context;
use crate::domain::CreateAccessLogInput;
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    async fn create(&self, ctx: &Context, input: &CreateAccessLogInput) -> Result<()>;
}

pub struct AccessLogRepositoryImpl {
    db: MySqlDb,
}

impl AccessLogRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccessLogRepository for AccessLogRepositoryImpl {
    async fn create(&self, ctx: &Context, input: &CreateAccessLogInput) -> Result<()> {
        let mut conn = self.db.acquire(ctx).await?;
        sqlx::query(
            r#"
            INSERT INTO access_logs (user_id, status, ip, user_agent, login_at)
            VALUES (?, ?, ?, ?, NOW())
            "#,
        )
        .bind(input.user_id)
        .bind(input.status.as_str())
        .bind(&input.ip)
        .bind(&input.user_agent)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
