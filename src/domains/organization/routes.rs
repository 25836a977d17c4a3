use crate::domains::organization::api as organization_api;
use crate::state::HasServices;
use axum::{
    routing::{get, post},
    Router,
};

pub fn protected_routes<S>() -> Router<S>
where
    S: HasServices,
{
    Router::new()
        .route(
            "/api/v1/branches",
            get(organization_api::list::<S>).post(organization_api::create::<S>),
        )
        .route(
            "/api/v1/branches/{id}/access",
            post(organization_api::assign_access::<S>),
        )
}
