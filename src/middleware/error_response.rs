//! Error response normalization middleware
//!
//! Every 4xx/5xx leaving the API is an `application/problem+json` document
//! whose `instance` is the request path. Framework rejections (malformed
//! JSON, unknown route, wrong method, timeouts) are replaced wholesale so
//! parser details never reach the client.

use crate::error::{Problem, PROBLEM_CONTENT_TYPE};
use axum::{
    body::Body,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn normalize_error_response(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let status = response.status();

    // Health/readiness endpoints return their own plain-text responses
    if path == "/health" || path == "/ready" {
        return response;
    }

    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    if let Some(problem) = response.extensions().get::<Problem>() {
        if problem.instance.is_some() {
            return response;
        }
        return problem.clone().with_instance(path).into_response();
    }

    let is_problem = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(PROBLEM_CONTENT_TYPE));
    if is_problem {
        return response;
    }

    Problem::from_status(status)
        .with_instance(path)
        .into_response()
}
