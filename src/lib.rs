//! Payroll Core - request dispatch and tenancy backend
//!
//! Every HTTP endpoint turns into a typed request sent through the
//! `Mediator`. Handlers receive a request-scoped `Context` carrying the
//! authenticated principal, the resolved tenant and, inside
//! `within_transaction`, the open database transaction.

pub mod api;
pub mod background;
pub mod config;
pub mod context;
pub mod credential;
pub mod domain;
pub mod domains;
pub mod error;
pub mod events;
pub mod mediator;
pub mod middleware;
pub mod repository;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod tenancy;
pub mod transactor;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
