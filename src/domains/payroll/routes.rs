use crate::domains::payroll::api as payroll_api;
use crate::state::HasServices;
use axum::{routing::get, Router};

pub fn protected_routes<S>() -> Router<S>
where
    S: HasServices,
{
    Router::new()
        .route("/api/v1/payroll/config", get(payroll_api::get_config::<S>))
        .route(
            "/api/v1/payroll/current-cycle",
            get(payroll_api::current_cycle::<S>),
        )
}
