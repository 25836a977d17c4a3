//! Superadmin API handlers

use crate::api::SuccessResponse;
use crate::context::Context;
use crate::domain::StringUuid;
use crate::domains::superadmin::BootstrapCompany;
use crate::error::Result;
use crate::state::HasServices;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct BootstrapCompanyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub admin_user_id: Option<StringUuid>,
}

/// POST /api/v1/superadmin/companies
pub async fn bootstrap_company<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    Json(input): Json<BootstrapCompanyInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let bootstrap = state
        .mediator()
        .send(
            &ctx,
            BootstrapCompany {
                name: input.name,
                admin_user_id: input.admin_user_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(bootstrap))))
}
