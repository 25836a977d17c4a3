//! Tenant scope middleware
//!
//! Runs after `require_auth`. When the request names a company, the scope
//! is resolved against the principal's grants and attached to the context.
//! Requests without tenant headers pass through with no scope; handlers
//! that need one reject them through `Context::require_tenant`.

use super::context::request_context;
use crate::state::HasServices;
use crate::tenancy::parse_hint;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn resolve_tenant<S: HasServices>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let hint = match parse_hint(request.headers()) {
        Ok(Some(hint)) => hint,
        Ok(None) => return next.run(request).await,
        Err(e) => return e.into_response(),
    };

    let ctx = request_context(&request);
    let user = match ctx.require_user() {
        Ok(user) => user.clone(),
        Err(e) => return e.into_response(),
    };

    match state
        .tenant_resolver()
        .resolve(&ctx, &user, hint.company_id, hint.branch_id)
        .await
    {
        Ok(scope) => {
            tracing::debug!(
                company_id = %scope.company_id,
                branch_id = ?scope.branch_id.map(|b| b.to_string()),
                is_admin = scope.is_admin,
                "Tenant scope attached"
            );
            request.extensions_mut().insert(ctx.with_tenant(scope));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
