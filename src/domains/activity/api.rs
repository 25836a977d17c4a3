//! Activity log API handlers

use crate::api::SuccessResponse;
use crate::context::Context;
use crate::domain::ActivityLogQuery;
use crate::domains::activity::ListActivityLogs;
use crate::error::Result;
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

/// GET /api/v1/activity-logs
pub async fn list<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    Query(query): Query<ActivityLogQuery>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = query.clamped();
    let logs = state
        .mediator()
        .send(&ctx, ListActivityLogs { limit, offset })
        .await?;
    Ok(Json(SuccessResponse::new(logs)))
}
