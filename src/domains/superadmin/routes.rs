use crate::domains::superadmin::api as superadmin_api;
use crate::state::HasServices;
use axum::{routing::post, Router};

pub fn protected_routes<S>() -> Router<S>
where
    S: HasServices,
{
    Router::new().route(
        "/api/v1/superadmin/companies",
        post(superadmin_api::bootstrap_company::<S>),
    )
}
