//! Bearer authentication
//!
//! Validates the access token, attaches the principal to the request
//! `Context` and records `user_id` on the request span. Requests without a
//! valid token are rejected with 401 before reaching the endpoint.

use super::context::request_context;
use crate::error::AppError;
use crate::state::HasServices;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Span;

pub async fn require_auth<S: HasServices>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer_token(request.headers()) {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    let claims = match state.credentials().parse_access(token) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };
    let user = match claims.user_info() {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    Span::current().record("user_id", tracing::field::display(user.id));
    let ctx = request_context(&request).with_user(user);
    request.extensions_mut().insert(ctx);

    next.run(request).await
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Authorization header must use Bearer scheme".to_string())
        })
}
