//! Data access layer (Repository pattern)
//!
//! Every repository method takes the request `Context` and asks its
//! `DbContext` for a connection, so the same call joins an open
//! `within_transaction` scope or runs on a pooled connection.

pub mod access;
pub mod access_log;
pub mod activity_log;
pub mod branch;
pub mod company;
pub mod payroll_config;
pub mod refresh_token;
pub mod user;

pub use access::{AccessRepository, AccessRepositoryImpl};
pub use access_log::{AccessLogRepository, AccessLogRepositoryImpl};
pub use activity_log::{ActivityLogRepository, ActivityLogRepositoryImpl};
pub use branch::{BranchRepository, BranchRepositoryImpl};
pub use company::{CompanyRepository, CompanyRepositoryImpl};
pub use payroll_config::{PayrollConfigRepository, PayrollConfigRepositoryImpl};
pub use refresh_token::{RefreshTokenRepository, RefreshTokenRepositoryImpl};
pub use user::{CreateUserRecord, UserRepository, UserRepositoryImpl};

use crate::error::AppError;
use crate::transactor::DbContext;
use sqlx::MySql;

/// Connection accessor used by the MySQL repositories
pub type MySqlDb = DbContext<MySql>;

/// Map a unique-key violation to `Conflict`, anything else to a database error.
pub(crate) fn conflict_on_duplicate(e: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("1062") || db_err.is_unique_violation() {
            return AppError::Conflict(format!("{} already exists", what));
        }
    }
    AppError::Database(e)
}
