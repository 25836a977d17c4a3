//! Identity requests: sessions, the caller's profile and principal management

use crate::context::Context;
use crate::credential::{CredentialService, PasswordHasher, TokenPair};
use crate::domain::{CreateAccessLogInput, CreateUserInput, LoginStatus, StringUuid, UserInfo};
use crate::domains::activity;
use crate::error::{AppError, Result};
use crate::events::EventBus;
use crate::mediator::{Handler, NoResponse, Request};
use crate::repository::{AccessLogRepository, AccessRepository, CreateUserRecord, UserRepository};
use crate::transactor::Transactor;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "invalid username or password";
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-users";

// ==================== Login ====================

#[derive(Clone)]
pub struct Login {
    pub username: String,
    pub password: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: UserInfo,
    pub tokens: TokenPair,
}

impl Request for Login {
    type Response = LoginResult;
}

pub struct LoginHandler {
    users: Arc<dyn UserRepository>,
    access_logs: Arc<dyn AccessLogRepository>,
    credentials: Arc<CredentialService>,
    hasher: Arc<dyn PasswordHasher>,
    decoy_hash: OnceLock<Option<String>>,
}

impl LoginHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        access_logs: Arc<dyn AccessLogRepository>,
        credentials: Arc<CredentialService>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            access_logs,
            credentials,
            hasher,
            decoy_hash: OnceLock::new(),
        }
    }

    /// Unknown usernames still pay for one verify, so both rejections take
    /// the same time.
    fn verify_decoy(&self, password: &str) {
        let decoy = self
            .decoy_hash
            .get_or_init(|| self.hasher.hash(DECOY_PASSWORD).ok());
        if let Some(hash) = decoy {
            let _ = self.hasher.verify(password, hash);
        }
    }

    /// Access log writes never fail the login itself.
    async fn record_attempt(
        &self,
        ctx: &Context,
        user_id: Option<StringUuid>,
        status: LoginStatus,
        req: &Login,
    ) {
        let input = CreateAccessLogInput {
            user_id,
            status,
            ip: req.ip.clone(),
            user_agent: req.user_agent.clone(),
        };
        if let Err(e) = self.access_logs.create(ctx, &input).await {
            tracing::warn!(parent: &ctx.logger(), error = %e, "Failed to write access log");
        }
    }
}

#[async_trait]
impl Handler<Login> for LoginHandler {
    async fn handle(&self, ctx: &Context, req: Login) -> Result<LoginResult> {
        let user = self.users.find_by_username(ctx, &req.username).await?;
        let verified = match &user {
            Some(user) => self.hasher.verify(&req.password, &user.password_hash)?,
            None => {
                self.verify_decoy(&req.password);
                false
            }
        };

        let user = match user {
            Some(user) if verified => user,
            other => {
                self.record_attempt(ctx, other.map(|u| u.id), LoginStatus::Failed, &req)
                    .await;
                metrics::counter!("payroll_auth_login_total", "result" => "failure").increment(1);
                tracing::warn!(parent: &ctx.logger(), username = %req.username, "Login rejected");
                return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        let info = user.info();
        let tokens = self.credentials.issue_session(ctx, &info).await?;

        self.record_attempt(ctx, Some(info.id), LoginStatus::Success, &req)
            .await;
        metrics::counter!("payroll_auth_login_total", "result" => "success").increment(1);
        tracing::info!(parent: &ctx.logger(), user_id = %info.id, "Login succeeded");

        Ok(LoginResult { user: info, tokens })
    }
}

// ==================== Refresh ====================

#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub refresh_token: String,
}

impl Request for RefreshSession {
    type Response = TokenPair;
}

pub struct RefreshSessionHandler {
    users: Arc<dyn UserRepository>,
    credentials: Arc<CredentialService>,
    transactor: Arc<Transactor>,
}

impl RefreshSessionHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        credentials: Arc<CredentialService>,
        transactor: Arc<Transactor>,
    ) -> Self {
        Self {
            users,
            credentials,
            transactor,
        }
    }
}

#[async_trait]
impl Handler<RefreshSession> for RefreshSessionHandler {
    async fn handle(&self, ctx: &Context, req: RefreshSession) -> Result<TokenPair> {
        let claims = self.credentials.parse_refresh(&req.refresh_token)?;
        let principal = self
            .users
            .find_by_id(ctx, claims.user_id()?)
            .await?
            .map(|user| user.info())
            .ok_or_else(|| {
                tracing::warn!(parent: &ctx.logger(), sub = %claims.sub, "Refresh for unknown principal");
                AppError::Unauthorized("invalid or expired token".to_string())
            })?;

        let credentials = &self.credentials;
        let token = req.refresh_token;
        self.transactor
            .within_transaction(ctx, move |tx, _| async move {
                credentials.rotate(&tx, &token, &principal).await
            })
            .await
    }
}

// ==================== Logout ====================

/// Revoke the presented refresh token, if any. Unknown tokens are ignored.
#[derive(Debug, Clone, Default)]
pub struct Logout {
    pub refresh_token: Option<String>,
}

impl Request for Logout {
    type Response = NoResponse;
}

pub struct LogoutHandler {
    credentials: Arc<CredentialService>,
}

impl LogoutHandler {
    pub fn new(credentials: Arc<CredentialService>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Handler<Logout> for LogoutHandler {
    async fn handle(&self, ctx: &Context, req: Logout) -> Result<NoResponse> {
        if let Some(token) = req.refresh_token.filter(|t| !t.is_empty()) {
            let digest = self.credentials.digest(&token)?;
            if !self.credentials.revoke_refresh(ctx, &digest).await? {
                tracing::debug!(parent: &ctx.logger(), "Logout with unknown or revoked refresh token");
            }
        }
        Ok(NoResponse)
    }
}

// ==================== Profile ====================

#[derive(Debug, Clone, Default)]
pub struct GetProfile;

impl Request for GetProfile {
    type Response = UserInfo;
}

pub struct GetProfileHandler {
    users: Arc<dyn UserRepository>,
}

impl GetProfileHandler {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Handler<GetProfile> for GetProfileHandler {
    async fn handle(&self, ctx: &Context, _req: GetProfile) -> Result<UserInfo> {
        let user = ctx.require_user()?;
        self.users
            .find_by_id(ctx, user.id)
            .await?
            .map(|u| u.info())
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }
}

#[derive(Clone, Validate)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

impl Request for ChangePassword {
    type Response = NoResponse;
}

pub struct ChangePasswordHandler {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl ChangePasswordHandler {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }
}

#[async_trait]
impl Handler<ChangePassword> for ChangePasswordHandler {
    async fn handle(&self, ctx: &Context, req: ChangePassword) -> Result<NoResponse> {
        req.validate()?;
        let principal = ctx.require_user()?;
        let user = self
            .users
            .find_by_id(ctx, principal.id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

        if !self.hasher.verify(&req.current_password, &user.password_hash)? {
            return Err(AppError::BadRequest(
                "current password is incorrect".to_string(),
            ));
        }
        if req.new_password == req.current_password {
            return Err(AppError::Unprocessable(
                "new password must differ from the current password".to_string(),
            ));
        }

        let hash = self.hasher.hash(&req.new_password)?;
        self.users.update_password(ctx, user.id, &hash).await?;
        tracing::info!(parent: &ctx.logger(), user_id = %user.id, "Password changed");
        Ok(NoResponse)
    }
}

// ==================== Principals ====================

/// Create a principal. Inside a company scope the new user is granted its
/// role in that company; only a superadmin may create one without a scope.
#[derive(Clone)]
pub struct CreateUser {
    pub input: CreateUserInput,
}

impl Request for CreateUser {
    type Response = UserInfo;
}

pub struct CreateUserHandler {
    users: Arc<dyn UserRepository>,
    access: Arc<dyn AccessRepository>,
    hasher: Arc<dyn PasswordHasher>,
    transactor: Arc<Transactor>,
    bus: EventBus,
}

impl CreateUserHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        access: Arc<dyn AccessRepository>,
        hasher: Arc<dyn PasswordHasher>,
        transactor: Arc<Transactor>,
        bus: EventBus,
    ) -> Self {
        Self {
            users,
            access,
            hasher,
            transactor,
            bus,
        }
    }
}

#[async_trait]
impl Handler<CreateUser> for CreateUserHandler {
    async fn handle(&self, ctx: &Context, req: CreateUser) -> Result<UserInfo> {
        req.input.validate()?;
        let actor = ctx.require_user()?;

        let company_id = if actor.role.is_superadmin() && ctx.tenant().is_none() {
            None
        } else {
            Some(ctx.require_tenant_admin()?.company_id)
        };

        if req.input.role.is_superadmin() {
            return Err(AppError::Forbidden(
                "superadmin accounts cannot be created".to_string(),
            ));
        }

        let record = CreateUserRecord {
            username: req.input.username,
            role: req.input.role,
            password_hash: self.hasher.hash(&req.input.password)?,
        };

        self.transactor
            .within_transaction(ctx, |tx, hooks| async move {
                let user = self.users.create(&tx, &record).await?;
                if let Some(company_id) = company_id {
                    self.access
                        .grant_company_role(&tx, user.id, company_id, user.role)
                        .await?;
                }

                let event = activity::recorded(&tx, "create", "user", user.id)?;
                activity::publish_after_commit(&hooks, &self.bus, &tx, event);
                Ok(user.info())
            })
            .await
    }
}
