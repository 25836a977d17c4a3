//! Superadmin operations spanning several modules

pub mod api;
pub mod routes;
pub mod service;

pub use service::{BootstrapCompany, BootstrapCompanyHandler, CompanyBootstrap};

use super::Dependencies;
use std::sync::Arc;

pub fn register(deps: &Dependencies) {
    deps.mediator
        .register::<BootstrapCompany, _>(BootstrapCompanyHandler::new(
            Arc::downgrade(&deps.mediator),
            deps.users.clone(),
            deps.transactor.clone(),
            deps.bus.clone(),
        ));
}
