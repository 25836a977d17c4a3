//! Tenant scope and the grants it is derived from

use super::common::StringUuid;
use super::principal::Role;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Authoritative `(company, branch?)` scope of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    pub company_id: StringUuid,
    pub branch_id: Option<StringUuid>,
    pub is_admin: bool,
}

/// Role a principal holds inside one company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CompanyRole {
    pub user_id: StringUuid,
    pub company_id: StringUuid,
    pub role: Role,
}

/// Branch assignment, carrying the branch's company for the scope check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BranchAccess {
    pub user_id: StringUuid,
    pub branch_id: StringUuid,
    pub company_id: StringUuid,
}
