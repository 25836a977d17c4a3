//! Company bootstrap: company, first admin and default payroll in one
//! transaction, composed from other modules' requests

use crate::context::Context;
use crate::domain::{Company, CompanyRole, PayrollConfig, Role, StringUuid};
use crate::domains::activity;
use crate::domains::organization::{CreateCompany, GrantCompanyRole};
use crate::domains::payroll::CreateDefaultPayrollConfig;
use crate::error::{AppError, Result};
use crate::events::EventBus;
use crate::mediator::{Handler, Mediator, Request};
use crate::repository::UserRepository;
use crate::transactor::Transactor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone)]
pub struct BootstrapCompany {
    pub name: String,
    /// Existing principal made admin of the new company
    pub admin_user_id: Option<StringUuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyBootstrap {
    pub company: Company,
    pub payroll_config: PayrollConfig,
    pub admin: Option<CompanyRole>,
}

impl Request for BootstrapCompany {
    type Response = CompanyBootstrap;
}

pub struct BootstrapCompanyHandler {
    // Weak: the mediator owns this handler.
    mediator: Weak<Mediator>,
    users: Arc<dyn UserRepository>,
    transactor: Arc<Transactor>,
    bus: EventBus,
}

impl BootstrapCompanyHandler {
    pub fn new(
        mediator: Weak<Mediator>,
        users: Arc<dyn UserRepository>,
        transactor: Arc<Transactor>,
        bus: EventBus,
    ) -> Self {
        Self {
            mediator,
            users,
            transactor,
            bus,
        }
    }
}

#[async_trait]
impl Handler<BootstrapCompany> for BootstrapCompanyHandler {
    async fn handle(&self, ctx: &Context, req: BootstrapCompany) -> Result<CompanyBootstrap> {
        ctx.require_superadmin()?;
        let mediator = self
            .mediator
            .upgrade()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("mediator is gone")))?;

        if let Some(admin_id) = req.admin_user_id {
            let admin = self
                .users
                .find_by_id(ctx, admin_id)
                .await?
                .ok_or_else(|| AppError::NotFound("admin user not found".to_string()))?;
            if admin.role.is_superadmin() {
                return Err(AppError::BadRequest(
                    "a superadmin cannot be a company admin".to_string(),
                ));
            }
        }

        let bootstrap = self
            .transactor
            .within_transaction(ctx, |tx, hooks| async move {
                let company = mediator.send(&tx, CreateCompany { name: req.name }).await?;

                let admin = match req.admin_user_id {
                    Some(user_id) => Some(
                        mediator
                            .send(
                                &tx,
                                GrantCompanyRole {
                                    user_id,
                                    company_id: company.id,
                                    role: Role::Admin,
                                },
                            )
                            .await?,
                    ),
                    None => None,
                };

                let payroll_config = mediator
                    .send(
                        &tx,
                        CreateDefaultPayrollConfig {
                            company_id: company.id,
                        },
                    )
                    .await?;

                let mut event = activity::recorded(&tx, "bootstrap", "company", company.id)?;
                event.company_id = Some(company.id);
                event.details = Some(serde_json::json!({
                    "name": company.name,
                    "admin_user_id": req.admin_user_id,
                }));
                activity::publish_after_commit(&hooks, &self.bus, &tx, event);

                Ok(CompanyBootstrap {
                    company,
                    payroll_config,
                    admin,
                })
            })
            .await?;

        tracing::info!(
            parent: &ctx.logger(),
            company_id = %bootstrap.company.id,
            "Company bootstrapped"
        );
        Ok(bootstrap)
    }
}
