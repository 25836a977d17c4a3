//! Company roles and branch assignments

use super::MySqlDb;
use crate::context::Context;
use crate::domain::{BranchAccess, CompanyRole, Role, StringUuid};
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn find_company_role(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        company_id: StringUuid,
    ) -> Result<Option<CompanyRole>>;

    /// Assignment of `user_id` to `branch_id`, with the branch's company.
    async fn find_branch_access(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        branch_id: StringUuid,
    ) -> Result<Option<BranchAccess>>;

    /// Company owning `branch_id`, if the branch exists.
    async fn find_branch_company(
        &self,
        ctx: &Context,
        branch_id: StringUuid,
    ) -> Result<Option<StringUuid>>;

    /// Insert or replace the role `user_id` holds in `company_id`.
    async fn grant_company_role(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        company_id: StringUuid,
        role: Role,
    ) -> Result<CompanyRole>;

    /// Returns false when the assignment already existed.
    async fn assign_branch(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        branch_id: StringUuid,
    ) -> Result<bool>;
}

pub struct AccessRepositoryImpl {
    db: MySqlDb,
}

impl AccessRepositoryImpl {
    pub fn new(db: MySqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccessRepository for AccessRepositoryImpl {
    async fn find_company_role(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        company_id: StringUuid,
    ) -> Result<Option<CompanyRole>> {
        let mut conn = self.db.acquire(ctx).await?;
        let role = sqlx::query_as::<_, CompanyRole>(
            r#"
            SELECT user_id, company_id, role
            FROM company_roles
            WHERE user_id = ? AND company_id = ?
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(role)
    }

    async fn find_branch_access(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        branch_id: StringUuid,
    ) -> Result<Option<BranchAccess>> {
        let mut conn = self.db.acquire(ctx).await?;
        let access = sqlx::query_as::<_, BranchAccess>(
            r#"
            SELECT ba.user_id, ba.branch_id, b.company_id
            FROM branch_access ba
            INNER JOIN branches b ON b.id = ba.branch_id
            WHERE ba.user_id = ? AND ba.branch_id = ?
            "#,
        )
        .bind(user_id)
        .bind(branch_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(access)
    }

    async fn find_branch_company(
        &self,
        ctx: &Context,
        branch_id: StringUuid,
    ) -> Result<Option<StringUuid>> {
        let mut conn = self.db.acquire(ctx).await?;
        let company_id: Option<(StringUuid,)> =
            sqlx::query_as("SELECT company_id FROM branches WHERE id = ?")
                .bind(branch_id)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(company_id.map(|(id,)| id))
    }

    async fn grant_company_role(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        company_id: StringUuid,
        role: Role,
    ) -> Result<CompanyRole> {
        let mut conn = self.db.acquire(ctx).await?;
        sqlx::query(
            r#"
            INSERT INTO company_roles (user_id, company_id, role, created_at)
            VALUES (?, ?, ?, NOW())
            ON DUPLICATE KEY UPDATE role = VALUES(role)
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .bind(role)
        .execute(&mut *conn)
        .await?;

        Ok(CompanyRole {
            user_id,
            company_id,
            role,
        })
    }

    async fn assign_branch(
        &self,
        ctx: &Context,
        user_id: StringUuid,
        branch_id: StringUuid,
    ) -> Result<bool> {
        let mut conn = self.db.acquire(ctx).await?;
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO branch_access (user_id, branch_id, created_at)
            VALUES (?, ?, NOW())
            "#,
        )
        .bind(user_id)
        .bind(branch_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
