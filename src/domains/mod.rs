//! Domain-oriented modules grouping requests, handlers, API adapters and
//! routes by bounded context.
//!
//! Every endpoint is a thin adapter that builds a mediator request from the
//! HTTP input and sends it with the request `Context`. The handlers live
//! next to their requests and are wired once by `register_all`, before the
//! mediator is sealed.

pub mod activity;
pub mod identity;
pub mod organization;
pub mod payroll;
pub mod superadmin;

use crate::credential::{CredentialService, PasswordHasher};
use crate::events::EventBus;
use crate::mediator::Mediator;
use crate::repository::{
    AccessLogRepository, AccessRepository, ActivityLogRepository, BranchRepository,
    CompanyRepository, PayrollConfigRepository, UserRepository,
};
use crate::state::HasServices;
use crate::transactor::Transactor;
use axum::Router;
use std::sync::Arc;

/// Collaborators the feature handlers are built from.
#[derive(Clone)]
pub struct Dependencies {
    pub users: Arc<dyn UserRepository>,
    pub access: Arc<dyn AccessRepository>,
    pub companies: Arc<dyn CompanyRepository>,
    pub branches: Arc<dyn BranchRepository>,
    pub payroll_configs: Arc<dyn PayrollConfigRepository>,
    pub access_logs: Arc<dyn AccessLogRepository>,
    pub activity_logs: Arc<dyn ActivityLogRepository>,
    pub credentials: Arc<CredentialService>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub transactor: Arc<Transactor>,
    pub mediator: Arc<Mediator>,
    pub bus: EventBus,
}

/// Register every mediator handler and bus subscriber.
///
/// # Panics
///
/// When a request type is registered twice or the mediator is already
/// sealed.
pub fn register_all(deps: &Dependencies) {
    identity::register(deps);
    organization::register(deps);
    payroll::register(deps);
    superadmin::register(deps);
    activity::register(deps);

    tracing::info!(
        handlers = deps.mediator.registered().len(),
        "Domain modules registered"
    );
}

/// Routes reachable without a bearer token.
pub fn public_routes<S: HasServices>() -> Router<S> {
    Router::new().merge(identity::routes::public_routes::<S>())
}

/// Routes behind authentication and tenant resolution.
pub fn protected_routes<S: HasServices>() -> Router<S> {
    Router::new()
        .merge(identity::routes::protected_routes::<S>())
        .merge(organization::routes::protected_routes::<S>())
        .merge(payroll::routes::protected_routes::<S>())
        .merge(activity::routes::protected_routes::<S>())
        .merge(superadmin::routes::protected_routes::<S>())
}
