//! Payroll API handlers

use crate::api::SuccessResponse;
use crate::context::Context;
use crate::domains::payroll::{CurrentPayCycle, GetPayrollConfig};
use crate::error::Result;
use crate::state::HasServices;
use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;

/// GET /api/v1/payroll/config
pub async fn get_config<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
) -> Result<impl IntoResponse> {
    let config = state.mediator().send(&ctx, GetPayrollConfig).await?;
    Ok(Json(SuccessResponse::new(config)))
}

/// GET /api/v1/payroll/current-cycle
pub async fn current_cycle<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
) -> Result<impl IntoResponse> {
    let cycle = state
        .mediator()
        .send(
            &ctx,
            CurrentPayCycle {
                today: Utc::now().date_naive(),
            },
        )
        .await?;
    Ok(Json(SuccessResponse::new(cycle)))
}
