//! HTTP middleware
//!
//! Outermost first: observability (request id, metrics), trace span,
//! error normalization, client ip, context installation, then per-route
//! authentication and tenant resolution.

pub mod auth;
pub mod client_ip;
pub mod context;
pub mod error_response;
pub mod metrics;
pub mod tenant;
pub mod trace;

pub use auth::require_auth;
pub use client_ip::inject_client_ip;
pub use context::attach_context;
pub use error_response::normalize_error_response;
pub use metrics::{ObservabilityLayer, RequestId};
pub use tenant::resolve_tenant;
pub use trace::SanitizedMakeSpan;
