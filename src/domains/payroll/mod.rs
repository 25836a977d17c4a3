//! Payroll: per-company configuration and the current pay cycle

pub mod api;
pub mod routes;
pub mod service;

pub use service::{
    CreateDefaultPayrollConfig, CreateDefaultPayrollConfigHandler, CurrentPayCycle,
    CurrentPayCycleHandler, GetPayrollConfig, GetPayrollConfigHandler,
};

use super::Dependencies;

pub fn register(deps: &Dependencies) {
    let mediator = &deps.mediator;

    mediator.register::<CreateDefaultPayrollConfig, _>(CreateDefaultPayrollConfigHandler::new(
        deps.payroll_configs.clone(),
    ));
    mediator.register::<GetPayrollConfig, _>(GetPayrollConfigHandler::new(
        deps.payroll_configs.clone(),
    ));
    mediator.register::<CurrentPayCycle, _>(CurrentPayCycleHandler::new(
        deps.payroll_configs.clone(),
    ));
}
