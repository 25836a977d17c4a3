//! Type-indexed in-process request dispatch
//!
//! Feature modules register one handler per request type at startup; the
//! HTTP adapters and other handlers then `send` requests without knowing
//! which module serves them. The registry is frozen by `seal()` before the
//! server starts and read without locking afterwards.

use crate::context::Context;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock};

/// A request value. The associated type is what its handler returns.
pub trait Request: Send + 'static {
    type Response: Send + 'static;
}

/// Response of commands that return nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoResponse;

#[async_trait]
pub trait Handler<R: Request>: Send + Sync + 'static {
    async fn handle(&self, ctx: &Context, req: R) -> Result<R::Response>;
}

type AnyBox = Box<dyn Any + Send>;

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn dispatch(&self, ctx: &Context, req: AnyBox) -> Result<AnyBox>;
}

struct Erased<R, H> {
    handler: H,
    _request: PhantomData<fn(R)>,
}

#[async_trait]
impl<R, H> ErasedHandler for Erased<R, H>
where
    R: Request,
    H: Handler<R>,
{
    async fn dispatch(&self, ctx: &Context, req: AnyBox) -> Result<AnyBox> {
        let req = req
            .downcast::<R>()
            .map_err(|_| AppError::HandlerTypeMismatch(std::any::type_name::<R>()))?;
        let response = self.handler.handle(ctx, *req).await?;
        Ok(Box::new(response))
    }
}

#[derive(Clone)]
struct Registration {
    name: &'static str,
    handler: Arc<dyn ErasedHandler>,
}

type Registry = HashMap<TypeId, Registration>;

pub struct Mediator {
    pending: Mutex<Option<Registry>>,
    sealed: OnceLock<Registry>,
}

impl Default for Mediator {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Some(Registry::new())),
            sealed: OnceLock::new(),
        }
    }
}

impl Mediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `R`.
    ///
    /// # Panics
    ///
    /// When `R` already has a handler or the mediator was sealed. Both are
    /// wiring bugs and must stop the process at startup.
    pub fn register<R, H>(&self, handler: H)
    where
        R: Request,
        H: Handler<R>,
    {
        let name = std::any::type_name::<R>();
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let registry = match pending.as_mut() {
            Some(registry) if self.sealed.get().is_none() => registry,
            _ => panic!("mediator is sealed; cannot register handler for {name}"),
        };
        if registry.contains_key(&TypeId::of::<R>()) {
            panic!("handler already registered for {name}");
        }
        registry.insert(
            TypeId::of::<R>(),
            Registration {
                name,
                handler: Arc::new(Erased {
                    handler,
                    _request: PhantomData,
                }),
            },
        );
        tracing::debug!(request = short_name(name), "Mediator handler registered");
    }

    /// Freeze the registry. Calling it twice is a no-op.
    pub fn seal(&self) {
        let taken = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(registry) = taken {
            let count = registry.len();
            if self.sealed.set(registry).is_err() {
                tracing::warn!("Mediator sealed twice");
                return;
            }
            tracing::info!(handlers = count, "Mediator sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// Names of the registered request types, sorted.
    pub fn registered(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = match self.sealed.get() {
            Some(registry) => registry.values().map(|r| short_name(r.name)).collect(),
            None => self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .as_ref()
                .map(|registry| registry.values().map(|r| short_name(r.name)).collect())
                .unwrap_or_default(),
        };
        names.sort_unstable();
        names
    }

    /// Dispatch `req` to its handler and return the handler's result unaltered.
    ///
    /// Only a sealed registry is consulted, so sending before `seal()` fails
    /// with `NoHandler` like any unregistered type.
    pub async fn send<R: Request>(&self, ctx: &Context, req: R) -> Result<R::Response> {
        let type_name = std::any::type_name::<R>();
        let request = short_name(type_name);

        let registration = match self
            .sealed
            .get()
            .and_then(|registry| registry.get(&TypeId::of::<R>()))
        {
            Some(registration) => registration.clone(),
            None => {
                metrics::counter!("payroll_mediator_dispatch_total", "request" => request, "outcome" => "no_handler")
                    .increment(1);
                return Err(AppError::NoHandler(type_name));
            }
        };

        tracing::debug!(parent: &ctx.logger(), request, "Dispatching request");
        let result = registration.handler.dispatch(ctx, Box::new(req)).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("payroll_mediator_dispatch_total", "request" => request, "outcome" => outcome)
            .increment(1);

        result?
            .downcast::<R::Response>()
            .map(|response| *response)
            .map_err(|_| AppError::HandlerTypeMismatch(type_name))
    }
}

/// `payroll_core::domains::identity::Login` -> `Login`
fn short_name(type_name: &'static str) -> &'static str {
    type_name.rsplit("::").next().unwrap_or(type_name)
}
