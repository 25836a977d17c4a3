//! Request span construction
//!
//! The span built here is the logger every `Context` of the request carries.
//! Sensitive query parameter values are redacted before they reach the logs.

use super::metrics::RequestId;
use axum::http::Request;
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

/// Query parameter names whose values must be redacted in logs.
const SENSITIVE_PARAMS: &[&str] = &[
    "access_token",
    "token",
    "refresh_token",
    "password",
    "current_password",
    "new_password",
    "api_key",
];

/// A `MakeSpan` that tags each request span with the application name and
/// request id, and leaves `user_id` to be recorded by the auth middleware.
#[derive(Clone, Debug)]
pub struct SanitizedMakeSpan {
    app: Arc<str>,
}

impl SanitizedMakeSpan {
    pub fn new(app: impl Into<Arc<str>>) -> Self {
        Self { app: app.into() }
    }
}

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.as_str())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            request_id = %request_id,
            app = %self.app,
            method = %request.method(),
            uri = %sanitize_uri(request.uri()),
            user_id = tracing::field::Empty,
        )
    }
}

/// Sanitize a URI by redacting the values of sensitive query parameters.
///
/// `/api/v1/auth/refresh?refresh_token=eyJhbG...` becomes
/// `/api/v1/auth/refresh?refresh_token=[REDACTED]`
fn sanitize_uri(uri: &axum::http::Uri) -> String {
    let query = match uri.query() {
        Some(q) => q,
        None => return uri.path().to_string(),
    };

    let sanitized_pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{key}=[REDACTED]")
            }
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), sanitized_pairs.join("&"))
}
