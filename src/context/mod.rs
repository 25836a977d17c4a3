//! Immutable per-request context
//!
//! A `Context` carries the authenticated user, the resolved tenant scope, a
//! correlation span and an optional deadline through every layer of a
//! request, including mediator dispatch and transaction scopes. Every
//! `with_*` call returns a new value; nothing is ever mutated in place, so a
//! context handed to a detached task keeps the values it had when it was
//! captured.

use crate::domain::{StringUuid, TenantScope, UserInfo};
use crate::error::{AppError, Result};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Span;

#[derive(Clone, Default)]
struct Inner {
    request_id: Option<String>,
    user: Option<UserInfo>,
    tenant: Option<TenantScope>,
    logger: Option<Span>,
    deadline: Option<Instant>,
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Empty context, used at startup and in background jobs.
    pub fn background() -> Self {
        Self::default()
    }

    fn derive(&self, apply: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = (*self.inner).clone();
        apply(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        self.derive(|inner| inner.request_id = Some(request_id))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.inner.request_id.as_deref()
    }

    pub fn with_user(&self, user: UserInfo) -> Self {
        self.derive(|inner| inner.user = Some(user))
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.inner.user.as_ref()
    }

    pub fn with_tenant(&self, tenant: TenantScope) -> Self {
        self.derive(|inner| inner.tenant = Some(tenant))
    }

    pub fn tenant(&self) -> Option<&TenantScope> {
        self.inner.tenant.as_ref()
    }

    pub fn with_logger(&self, span: Span) -> Self {
        self.derive(|inner| inner.logger = Some(span))
    }

    /// Span attached to this context, or the current span when none was attached.
    pub fn logger(&self) -> Span {
        self.inner.logger.clone().unwrap_or_else(Span::current)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(|inner| inner.deadline = Some(deadline))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Copy of this context with no deadline.
    pub fn without_deadline(&self) -> Self {
        if self.inner.deadline.is_none() {
            return self.clone();
        }
        self.derive(|inner| inner.deadline = None)
    }

    /// Time left before the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }

    /// Attach a typed value. A later value of the same type shadows the earlier one.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        let value: Arc<dyn Any + Send + Sync> = Arc::new(value);
        self.derive(|inner| {
            inner.values.insert(TypeId::of::<T>(), value);
        })
    }

    /// Copy of this context without the value of type `T`.
    pub fn without_value<T: Any + Send + Sync>(&self) -> Self {
        if !self.inner.values.contains_key(&TypeId::of::<T>()) {
            return self.clone();
        }
        self.derive(|inner| {
            inner.values.remove(&TypeId::of::<T>());
        })
    }

    pub fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    pub fn require_user(&self) -> Result<&UserInfo> {
        self.user()
            .ok_or_else(|| AppError::Unauthorized("missing user context".to_string()))
    }

    pub fn require_tenant(&self) -> Result<&TenantScope> {
        self.tenant()
            .ok_or_else(|| AppError::Unauthorized("missing tenant context".to_string()))
    }

    /// Tenant scope that must name a branch.
    pub fn require_branch(&self) -> Result<(StringUuid, StringUuid)> {
        let tenant = self.require_tenant()?;
        let branch_id = tenant
            .branch_id
            .ok_or_else(|| AppError::BadRequest("X-Branch-ID header is required".to_string()))?;
        Ok((tenant.company_id, branch_id))
    }

    /// Superadmin, or admin of the scoped company.
    pub fn require_tenant_admin(&self) -> Result<&TenantScope> {
        let user = self.require_user()?;
        let tenant = self.require_tenant()?;
        if user.role.is_superadmin() || tenant.is_admin {
            Ok(tenant)
        } else {
            Err(AppError::Forbidden("company admin required".to_string()))
        }
    }

    pub fn require_superadmin(&self) -> Result<&UserInfo> {
        let user = self.require_user()?;
        if user.role.is_superadmin() {
            Ok(user)
        } else {
            Err(AppError::Forbidden("superadmin required".to_string()))
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.inner.request_id)
            .field("user", &self.inner.user)
            .field("tenant", &self.inner.tenant)
            .field("deadline", &self.inner.deadline)
            .field("values", &self.inner.values.len())
            .finish()
    }
}

impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Context>()
            .cloned()
            .unwrap_or_else(|| Context::background().with_logger(Span::current())))
    }
}
