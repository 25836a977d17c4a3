//! Activity log records and the event that produces them

use super::common::StringUuid;
use crate::events::{Event, NamedEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: StringUuid,
    pub user_id: StringUuid,
    pub company_id: Option<StringUuid>,
    pub branch_id: Option<StringUuid>,
    pub action: String,
    pub entity_name: String,
    pub entity_id: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Something a principal did that belongs in the activity trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecorded {
    pub user_id: StringUuid,
    pub company_id: Option<StringUuid>,
    pub branch_id: Option<StringUuid>,
    pub action: String,
    pub entity_name: String,
    pub entity_id: String,
    pub details: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

impl Event for ActivityRecorded {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl NamedEvent for ActivityRecorded {
    const NAME: &'static str = "ActivityRecorded";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityLogQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl ActivityLogQuery {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.offset.max(0))
    }
}
