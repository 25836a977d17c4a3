//! Tenant scope resolution
//!
//! Turns the `X-Company-ID` / `X-Branch-ID` hints of a request into an
//! authoritative `TenantScope`, checked against the principal's grants.

use crate::context::Context;
use crate::domain::{Role, StringUuid, TenantScope, UserInfo};
use crate::error::{AppError, Result};
use crate::repository::AccessRepository;
use axum::http::HeaderMap;
use std::sync::Arc;

pub const COMPANY_HEADER: &str = "x-company-id";
pub const BRANCH_HEADER: &str = "x-branch-id";

/// Scope requested by the client, not yet verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantHint {
    pub company_id: StringUuid,
    pub branch_id: Option<StringUuid>,
}

/// Read the tenant headers.
///
/// `Ok(None)` when no company header is present. Malformed ids, or a
/// branch without a company, are a bad request.
pub fn parse_hint(headers: &HeaderMap) -> Result<Option<TenantHint>> {
    let company = header_uuid(headers, COMPANY_HEADER)?;
    let branch = header_uuid(headers, BRANCH_HEADER)?;

    match (company, branch) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(AppError::BadRequest(
            "X-Branch-ID requires X-Company-ID".to_string(),
        )),
        (Some(company_id), branch_id) => Ok(Some(TenantHint {
            company_id,
            branch_id,
        })),
    }
}

fn header_uuid(headers: &HeaderMap, name: &'static str) -> Result<Option<StringUuid>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AppError::BadRequest(format!("{} is not valid text", name)))?
        .trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<StringUuid>()
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("{} must be a uuid", name)))
}

pub struct TenantResolver {
    access: Arc<dyn AccessRepository>,
}

impl TenantResolver {
    pub fn new(access: Arc<dyn AccessRepository>) -> Self {
        Self { access }
    }

    pub async fn resolve(
        &self,
        ctx: &Context,
        user: &UserInfo,
        company_id: StringUuid,
        branch_id: Option<StringUuid>,
    ) -> Result<TenantScope> {
        if user.role.is_superadmin() {
            if let Some(branch_id) = branch_id {
                let owner = self.access.find_branch_company(ctx, branch_id).await?;
                if owner != Some(company_id) {
                    tracing::warn!(
                        user_id = %user.id,
                        %company_id,
                        %branch_id,
                        "Branch does not belong to company"
                    );
                    return Err(AppError::Forbidden(
                        "branch does not belong to company".to_string(),
                    ));
                }
            }
            return Ok(TenantScope {
                company_id,
                branch_id,
                is_admin: true,
            });
        }

        let role = self
            .access
            .find_company_role(ctx, user.id, company_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %user.id, %company_id, "No company role");
                AppError::Forbidden("no access to company".to_string())
            })?;

        if let Some(branch_id) = branch_id {
            let access = self
                .access
                .find_branch_access(ctx, user.id, branch_id)
                .await?;
            match access {
                Some(access) if access.company_id == company_id => {}
                _ => {
                    tracing::warn!(user_id = %user.id, %company_id, %branch_id, "No branch access");
                    return Err(AppError::Forbidden("no access to branch".to_string()));
                }
            }
        }

        Ok(TenantScope {
            company_id,
            branch_id,
            is_admin: role.role == Role::Admin,
        })
    }
}
