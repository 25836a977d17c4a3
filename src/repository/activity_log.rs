//! Activity trail repository

use super::MySqlDb;
use crate::context::Context;
use crate::domain::{ActivityLog, ActivityRecorded, StringUuid};
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    async fn create(&self, ctx: &Context, activity: &ActivityRecorded) -> Result<StringUuid>;
    /// Newest first.
    async fn list_by_company(
        &self,
        ctx: &Context,
        company_id: StringUuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityLog>>;
}

pub struct ActivityLogRepositoryImpl {
    db: MySqlDb,
}

impl ActivityLogRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityLogRepository for ActivityLogRepositoryImpl {
    async fn create(&self, ctx: &Context, activity: &ActivityRecorded) -> Result<StringUuid> {
        let id = StringUuid::new_v4();
        let mut conn = self.db.acquire(ctx).await?;
        sqlx::query(
            r#"
            INSERT INTO activity_logs (id, user_id, company_id, branch_id, action, entity_name,
                                       entity_id, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(activity.user_id)
        .bind(activity.company_id)
        .bind(activity.branch_id)
        .bind(&activity.action)
        .bind(&activity.entity_name)
        .bind(&activity.entity_id)
        .bind(&activity.details)
        .bind(activity.occurred_at)
        .execute(&mut *conn)
        .await?;

        Ok(id)
    }

    async fn list_by_company(
        &self,
        ctx: &Context,
        company_id: StringUuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityLog>> {
        let mut conn = self.db.acquire(ctx).await?;
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, user_id, company_id, branch_id, action, entity_name, entity_id,
                   details, created_at
            FROM activity_logs
            WHERE company_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok(logs)
    }
}
