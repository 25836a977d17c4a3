//! Domain models for the payroll core

pub mod activity;
pub mod common;
pub mod organization;
pub mod payroll;
pub mod principal;
pub mod session;
pub mod tenancy;

pub use activity::*;
pub use common::StringUuid;
pub use organization::*;
pub use payroll::*;
pub use principal::*;
pub use session::*;
pub use tenancy::*;
