//! Activity trail writer and queries

use crate::context::Context;
use crate::domain::{ActivityLog, ActivityRecorded};
use crate::error::Result;
use crate::events::{EventBus, TypedEventHandler};
use crate::mediator::{Handler, Request};
use crate::repository::ActivityLogRepository;
use crate::transactor::PostCommit;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Activity by the context's user, scoped to its tenant when one is attached.
pub fn recorded(
    ctx: &Context,
    action: &str,
    entity_name: &str,
    entity_id: impl ToString,
) -> Result<ActivityRecorded> {
    let user = ctx.require_user()?;
    let tenant = ctx.tenant();
    Ok(ActivityRecorded {
        user_id: user.id,
        company_id: tenant.map(|t| t.company_id),
        branch_id: tenant.and_then(|t| t.branch_id),
        action: action.to_string(),
        entity_name: entity_name.to_string(),
        entity_id: entity_id.to_string(),
        details: None,
        occurred_at: Utc::now(),
    })
}

/// Publish `event` once the enclosing transaction commits.
pub fn publish_after_commit(
    hooks: &PostCommit,
    bus: &EventBus,
    ctx: &Context,
    event: ActivityRecorded,
) {
    let bus = bus.clone();
    let ctx = ctx.clone();
    hooks.register(move || async move {
        bus.publish(&ctx, event);
        Ok(())
    });
}

/// Persists every `ActivityRecorded` event.
pub struct ActivityLogWriter {
    activity_logs: Arc<dyn ActivityLogRepository>,
}

impl ActivityLogWriter {
    pub fn new(activity_logs: Arc<dyn ActivityLogRepository>) -> Self {
        Self { activity_logs }
    }
}

#[async_trait]
impl TypedEventHandler<ActivityRecorded> for ActivityLogWriter {
    async fn handle(&self, ctx: &Context, event: &ActivityRecorded) -> Result<()> {
        let id = self.activity_logs.create(ctx, event).await?;
        tracing::debug!(
            activity_id = %id,
            action = %event.action,
            entity = %event.entity_name,
            "Activity recorded"
        );
        Ok(())
    }
}

/// Newest activity of the scoped company. Company admins only.
#[derive(Debug, Clone)]
pub struct ListActivityLogs {
    pub limit: i64,
    pub offset: i64,
}

impl Request for ListActivityLogs {
    type Response = Vec<ActivityLog>;
}

pub struct ListActivityLogsHandler {
    activity_logs: Arc<dyn ActivityLogRepository>,
}

impl ListActivityLogsHandler {
    pub fn new(activity_logs: Arc<dyn ActivityLogRepository>) -> Self {
        Self { activity_logs }
    }
}

#[async_trait]
impl Handler<ListActivityLogs> for ListActivityLogsHandler {
    async fn handle(&self, ctx: &Context, req: ListActivityLogs) -> Result<Vec<ActivityLog>> {
        let tenant = ctx.require_tenant_admin()?;
        self.activity_logs
            .list_by_company(ctx, tenant.company_id, req.limit, req.offset)
            .await
    }
}
