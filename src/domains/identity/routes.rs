use crate::domains::identity::api as identity_api;
use crate::state::HasServices;
use axum::{
    routing::{get, post},
    Router,
};

pub fn public_routes<S>() -> Router<S>
where
    S: HasServices,
{
    Router::new()
        .route("/api/v1/auth/login", post(identity_api::login::<S>))
        .route("/api/v1/auth/refresh", post(identity_api::refresh::<S>))
        .route("/api/v1/auth/logout", post(identity_api::logout::<S>))
}

pub fn protected_routes<S>() -> Router<S>
where
    S: HasServices,
{
    Router::new()
        .route("/api/v1/auth/me", get(identity_api::me::<S>))
        .route(
            "/api/v1/auth/change-password",
            post(identity_api::change_password::<S>),
        )
        .route("/api/v1/users", post(identity_api::create_user::<S>))
}
