//! Request context installation
//!
//! Builds the base `Context` for every request from the request id, the
//! request span and the configured deadline, and stores it in the request
//! extensions where the auth and tenant middleware enrich it.

use super::metrics::RequestId;
use crate::context::Context;
use crate::state::HasServices;
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::Span;

pub async fn attach_context<S: HasServices>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut ctx = Context::background().with_logger(Span::current());
    if let Some(RequestId(id)) = request.extensions().get::<RequestId>() {
        ctx = ctx.with_request_id(id.clone());
    }
    let timeout = state.config().request_timeout;
    if !timeout.is_zero() {
        ctx = ctx.with_deadline(Instant::now() + timeout);
    }

    request.extensions_mut().insert(ctx);
    next.run(request).await
}

/// Context installed by `attach_context`, or a fresh one bound to the current span.
pub(crate) fn request_context(request: &Request<Body>) -> Context {
    request
        .extensions()
        .get::<Context>()
        .cloned()
        .unwrap_or_else(|| Context::background().with_logger(Span::current()))
}
