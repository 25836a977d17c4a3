//! Branch API handlers

use crate::api::SuccessResponse;
use crate::context::Context;
use crate::domain::{CreateBranchInput, StringUuid};
use crate::domains::organization::{AssignBranchAccess, CreateBranch, ListBranches};
use crate::error::Result;
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct AssignBranchAccessInput {
    pub user_id: StringUuid,
}

/// GET /api/v1/branches
pub async fn list<S: HasServices>(State(state): State<S>, ctx: Context) -> Result<impl IntoResponse> {
    let branches = state.mediator().send(&ctx, ListBranches).await?;
    Ok(Json(SuccessResponse::new(branches)))
}

/// POST /api/v1/branches
pub async fn create<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    Json(input): Json<CreateBranchInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let branch = state.mediator().send(&ctx, CreateBranch { input }).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(branch))))
}

/// POST /api/v1/branches/{id}/access
pub async fn assign_access<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    Path(branch_id): Path<StringUuid>,
    Json(input): Json<AssignBranchAccessInput>,
) -> Result<impl IntoResponse> {
    let assignment = state
        .mediator()
        .send(
            &ctx,
            AssignBranchAccess {
                branch_id,
                user_id: input.user_id,
            },
        )
        .await?;
    let status = if assignment.assigned {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(SuccessResponse::new(assignment))))
}
