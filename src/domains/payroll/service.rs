//! Payroll configuration and pay cycle queries

use crate::context::Context;
use crate::domain::{PayCycle, PayrollConfig, StringUuid};
use crate::error::{AppError, Result};
use crate::mediator::{Handler, Request};
use crate::repository::PayrollConfigRepository;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Create the default payroll configuration of a company.
#[derive(Debug, Clone)]
pub struct CreateDefaultPayrollConfig {
    pub company_id: StringUuid,
}

impl Request for CreateDefaultPayrollConfig {
    type Response = PayrollConfig;
}

pub struct CreateDefaultPayrollConfigHandler {
    configs: Arc<dyn PayrollConfigRepository>,
}

impl CreateDefaultPayrollConfigHandler {
    pub fn new(configs: Arc<dyn PayrollConfigRepository>) -> Self {
        Self { configs }
    }
}

#[async_trait]
impl Handler<CreateDefaultPayrollConfig> for CreateDefaultPayrollConfigHandler {
    async fn handle(
        &self,
        ctx: &Context,
        req: CreateDefaultPayrollConfig,
    ) -> Result<PayrollConfig> {
        let user = ctx.require_user()?;
        if !user.role.is_superadmin() {
            let tenant = ctx.require_tenant_admin()?;
            if tenant.company_id != req.company_id {
                return Err(AppError::Forbidden("no access to company".to_string()));
            }
        }

        let config = PayrollConfig::with_defaults(req.company_id);
        self.configs.create(ctx, &config).await?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetPayrollConfig;

impl Request for GetPayrollConfig {
    type Response = PayrollConfig;
}

pub struct GetPayrollConfigHandler {
    configs: Arc<dyn PayrollConfigRepository>,
}

impl GetPayrollConfigHandler {
    pub fn new(configs: Arc<dyn PayrollConfigRepository>) -> Self {
        Self { configs }
    }
}

#[async_trait]
impl Handler<GetPayrollConfig> for GetPayrollConfigHandler {
    async fn handle(&self, ctx: &Context, _req: GetPayrollConfig) -> Result<PayrollConfig> {
        let tenant = ctx.require_tenant()?;
        self.configs
            .find_by_company(ctx, tenant.company_id)
            .await?
            .ok_or_else(|| AppError::NotFound("payroll config not found".to_string()))
    }
}

/// Next pay date of the scoped company, as seen on `today`.
#[derive(Debug, Clone)]
pub struct CurrentPayCycle {
    pub today: NaiveDate,
}

impl Request for CurrentPayCycle {
    type Response = PayCycle;
}

pub struct CurrentPayCycleHandler {
    configs: Arc<dyn PayrollConfigRepository>,
}

impl CurrentPayCycleHandler {
    pub fn new(configs: Arc<dyn PayrollConfigRepository>) -> Self {
        Self { configs }
    }
}

#[async_trait]
impl Handler<CurrentPayCycle> for CurrentPayCycleHandler {
    async fn handle(&self, ctx: &Context, req: CurrentPayCycle) -> Result<PayCycle> {
        let tenant = ctx.require_tenant()?;
        let config = self
            .configs
            .find_by_company(ctx, tenant.company_id)
            .await?
            .ok_or_else(|| {
                AppError::NotApplicable("payroll is not configured for this company".to_string())
            })?;

        let pay_date = config.next_pay_date(req.today).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "no pay date after {} for pay day {}",
                req.today,
                config.pay_day
            ))
        })?;

        Ok(PayCycle {
            company_id: config.company_id,
            pay_date,
            currency: config.currency,
        })
    }
}
