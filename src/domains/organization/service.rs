//! Companies, branches and the access principals hold to them

use crate::context::Context;
use crate::domain::{Branch, Company, CompanyRole, CreateBranchInput, Role, StringUuid};
use crate::domains::activity;
use crate::error::{AppError, Result};
use crate::events::EventBus;
use crate::mediator::{Handler, Request};
use crate::repository::{AccessRepository, BranchRepository, CompanyRepository};
use crate::transactor::Transactor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Superadmin, or admin of `company_id` through the attached scope.
fn require_company_admin(ctx: &Context, company_id: StringUuid) -> Result<()> {
    if ctx.require_user()?.role.is_superadmin() {
        return Ok(());
    }
    let tenant = ctx.require_tenant_admin()?;
    if tenant.company_id != company_id {
        return Err(AppError::Forbidden("no access to company".to_string()));
    }
    Ok(())
}

// ==================== Companies ====================

#[derive(Debug, Clone)]
pub struct CreateCompany {
    pub name: String,
}

impl Request for CreateCompany {
    type Response = Company;
}

pub struct CreateCompanyHandler {
    companies: Arc<dyn CompanyRepository>,
}

impl CreateCompanyHandler {
    pub fn new(companies: Arc<dyn CompanyRepository>) -> Self {
        Self { companies }
    }
}

#[async_trait]
impl Handler<CreateCompany> for CreateCompanyHandler {
    async fn handle(&self, ctx: &Context, req: CreateCompany) -> Result<Company> {
        ctx.require_superadmin()?;
        let name = req.name.trim();
        if name.is_empty() || name.len() > 255 {
            return Err(AppError::BadRequest(
                "company name must be 1-255 characters".to_string(),
            ));
        }
        let company = self.companies.create(ctx, name).await?;
        tracing::info!(parent: &ctx.logger(), company_id = %company.id, "Company created");
        Ok(company)
    }
}

#[derive(Debug, Clone)]
pub struct GrantCompanyRole {
    pub user_id: StringUuid,
    pub company_id: StringUuid,
    pub role: Role,
}

impl Request for GrantCompanyRole {
    type Response = CompanyRole;
}

pub struct GrantCompanyRoleHandler {
    access: Arc<dyn AccessRepository>,
}

impl GrantCompanyRoleHandler {
    pub fn new(access: Arc<dyn AccessRepository>) -> Self {
        Self { access }
    }
}

#[async_trait]
impl Handler<GrantCompanyRole> for GrantCompanyRoleHandler {
    async fn handle(&self, ctx: &Context, req: GrantCompanyRole) -> Result<CompanyRole> {
        require_company_admin(ctx, req.company_id)?;
        if req.role.is_superadmin() {
            return Err(AppError::BadRequest(
                "superadmin is not a company role".to_string(),
            ));
        }
        self.access
            .grant_company_role(ctx, req.user_id, req.company_id, req.role)
            .await
    }
}

// ==================== Branches ====================

#[derive(Debug, Clone, Default)]
pub struct ListBranches;

impl Request for ListBranches {
    type Response = Vec<Branch>;
}

pub struct ListBranchesHandler {
    branches: Arc<dyn BranchRepository>,
}

impl ListBranchesHandler {
    pub fn new(branches: Arc<dyn BranchRepository>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl Handler<ListBranches> for ListBranchesHandler {
    async fn handle(&self, ctx: &Context, _req: ListBranches) -> Result<Vec<Branch>> {
        let tenant = ctx.require_tenant()?;
        self.branches.list_by_company(ctx, tenant.company_id).await
    }
}

#[derive(Debug, Clone)]
pub struct CreateBranch {
    pub input: CreateBranchInput,
}

impl Request for CreateBranch {
    type Response = Branch;
}

pub struct CreateBranchHandler {
    branches: Arc<dyn BranchRepository>,
    transactor: Arc<Transactor>,
    bus: EventBus,
}

impl CreateBranchHandler {
    pub fn new(branches: Arc<dyn BranchRepository>, transactor: Arc<Transactor>, bus: EventBus) -> Self {
        Self {
            branches,
            transactor,
            bus,
        }
    }
}

#[async_trait]
impl Handler<CreateBranch> for CreateBranchHandler {
    async fn handle(&self, ctx: &Context, req: CreateBranch) -> Result<Branch> {
        req.input.validate()?;
        let company_id = ctx.require_tenant_admin()?.company_id;

        self.transactor
            .within_transaction(ctx, |tx, hooks| async move {
                let branch = self
                    .branches
                    .create(&tx, company_id, req.input.name.trim())
                    .await?;
                let event = activity::recorded(&tx, "create", "branch", branch.id)?;
                activity::publish_after_commit(&hooks, &self.bus, &tx, event);
                Ok(branch)
            })
            .await
    }
}

#[derive(Debug, Clone)]
pub struct AssignBranchAccess {
    pub branch_id: StringUuid,
    pub user_id: StringUuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchAssignment {
    pub branch_id: StringUuid,
    pub user_id: StringUuid,
    /// False when the user already had access
    pub assigned: bool,
}

impl Request for AssignBranchAccess {
    type Response = BranchAssignment;
}

pub struct AssignBranchAccessHandler {
    access: Arc<dyn AccessRepository>,
    branches: Arc<dyn BranchRepository>,
    transactor: Arc<Transactor>,
    bus: EventBus,
}

impl AssignBranchAccessHandler {
    pub fn new(
        access: Arc<dyn AccessRepository>,
        branches: Arc<dyn BranchRepository>,
        transactor: Arc<Transactor>,
        bus: EventBus,
    ) -> Self {
        Self {
            access,
            branches,
            transactor,
            bus,
        }
    }
}

#[async_trait]
impl Handler<AssignBranchAccess> for AssignBranchAccessHandler {
    async fn handle(&self, ctx: &Context, req: AssignBranchAccess) -> Result<BranchAssignment> {
        let company_id = ctx.require_tenant_admin()?.company_id;

        // Branches of other companies are reported as missing.
        self.branches
            .find_by_id(ctx, req.branch_id)
            .await?
            .filter(|branch| branch.company_id == company_id)
            .ok_or_else(|| AppError::NotFound("branch not found".to_string()))?;

        if self
            .access
            .find_company_role(ctx, req.user_id, company_id)
            .await?
            .is_none()
        {
            return Err(AppError::Unprocessable(
                "user has no role in this company".to_string(),
            ));
        }

        self.transactor
            .within_transaction(ctx, |tx, hooks| async move {
                let assigned = self.access.assign_branch(&tx, req.user_id, req.branch_id).await?;
                if assigned {
                    let mut event =
                        activity::recorded(&tx, "assign", "branch_access", req.branch_id)?;
                    event.details = Some(serde_json::json!({ "user_id": req.user_id }));
                    activity::publish_after_commit(&hooks, &self.bus, &tx, event);
                }
                Ok(BranchAssignment {
                    branch_id: req.branch_id,
                    user_id: req.user_id,
                    assigned,
                })
            })
            .await
    }
}
