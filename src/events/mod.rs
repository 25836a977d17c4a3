//! In-process event bus
//!
//! Best-effort, at-most-once publish/subscribe keyed by event name. Each
//! subscriber runs on its own task; a panicking subscriber is logged and
//! does not affect the others or the publisher. Publish from a post-commit
//! hook when an event must not escape a rolled back transaction.

use crate::background::BackgroundTasks;
use crate::context::Context;
use crate::error::Result;
use crate::transactor;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A domain event. `name` is the topic subscribers register under.
pub trait Event: Any + Send + Sync {
    fn name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// Events with a fixed topic, for typed subscriptions.
pub trait NamedEvent: Event + Sized {
    const NAME: &'static str;
}

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &Context, event: Arc<dyn Event>) -> Result<()>;
}

/// Adapts a handler for one concrete event type.
#[async_trait]
pub trait TypedEventHandler<E: NamedEvent>: Send + Sync + 'static {
    async fn handle(&self, ctx: &Context, event: &E) -> Result<()>;
}

struct Typed<E, H> {
    handler: H,
    _event: PhantomData<fn(E)>,
}

#[async_trait]
impl<E, H> EventHandler for Typed<E, H>
where
    E: NamedEvent,
    H: TypedEventHandler<E>,
{
    async fn handle(&self, ctx: &Context, event: Arc<dyn Event>) -> Result<()> {
        match event.as_any().downcast_ref::<E>() {
            Some(typed) => self.handler.handle(ctx, typed).await,
            None => {
                tracing::warn!(event = event.name(), "Event payload does not match subscriber type");
                Ok(())
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<&'static str, Vec<Arc<dyn EventHandler>>>>>,
    tasks: BackgroundTasks,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the subscribers of `name`.
    pub fn subscribe(&self, name: &'static str, handler: Arc<dyn EventHandler>) {
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.entry(name).or_default().push(handler),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(name)
                .or_default()
                .push(handler),
        }
        tracing::debug!(event = name, "Subscriber registered");
    }

    pub fn subscribe_to<E, H>(&self, handler: H)
    where
        E: NamedEvent,
        H: TypedEventHandler<E>,
    {
        self.subscribe(
            E::NAME,
            Arc::new(Typed {
                handler,
                _event: PhantomData,
            }),
        );
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.snapshot(name).len()
    }

    fn snapshot(&self, name: &str) -> Vec<Arc<dyn EventHandler>> {
        let subscribers = match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.get(name).cloned().unwrap_or_default()
    }

    /// Deliver `event` to every subscriber of its name without waiting.
    /// Returns how many deliveries were scheduled.
    pub fn publish<E: Event>(&self, ctx: &Context, event: E) -> usize {
        let name = event.name();
        let handlers = self.snapshot(name);
        if handlers.is_empty() {
            tracing::debug!(parent: &ctx.logger(), event = name, "No subscribers for event");
            return 0;
        }

        let event: Arc<dyn Event> = Arc::new(event);
        let scheduled = handlers.len();
        let detached = transactor::detach(ctx);
        for (index, handler) in handlers.into_iter().enumerate() {
            let ctx = detached.clone();
            let event = event.clone();
            let span = tracing::debug_span!(parent: &ctx.logger(), "event", event = name, subscriber = index);
            self.tasks.spawn("event_subscriber", span, async move {
                match handler.handle(&ctx, event).await {
                    Ok(()) => {
                        metrics::counter!("payroll_events_delivered_total", "event" => name, "outcome" => "ok")
                            .increment(1);
                    }
                    Err(e) => {
                        metrics::counter!("payroll_events_delivered_total", "event" => name, "outcome" => "error")
                            .increment(1);
                        tracing::warn!(error = %e, "Event subscriber failed");
                    }
                }
            });
        }
        scheduled
    }

    /// Wait for in-flight deliveries, up to `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.drain(timeout).await
    }
}
