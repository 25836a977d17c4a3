use crate::domains::activity::api as activity_api;
use crate::state::HasServices;
use axum::{routing::get, Router};

pub fn protected_routes<S>() -> Router<S>
where
    S: HasServices,
{
    Router::new().route("/api/v1/activity-logs", get(activity_api::list::<S>))
}
