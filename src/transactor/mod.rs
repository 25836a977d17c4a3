//! Scoped database transactions with savepoint nesting and post-commit hooks
//!
//! `within_transaction` opens a transaction (or a savepoint when the context
//! already carries one), installs the session into a derived context and
//! hands the closure a `PostCommit` collector. Repositories reach the open
//! transaction through `DbContext::acquire`, so composing handlers that each
//! wrap their work in `within_transaction` yields a single transaction.

pub mod backend;
pub mod hooks;
pub mod sqlx_backend;

pub use backend::{MemoryBackend, TxBackend, TxSession};
pub use hooks::PostCommit;
pub use sqlx_backend::{DbConn, DbContext, SqlxBackend};

use crate::background::BackgroundTasks;
use crate::context::Context;
use crate::error::{AppError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// How a `within_transaction` call behaves when the context already carries
/// a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestedStrategy {
    /// Wrap the inner scope in a named savepoint.
    #[default]
    Savepoints,
    /// Reuse the outer transaction as-is.
    None,
}

impl std::str::FromStr for NestedStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "savepoints" | "savepoint" => Ok(NestedStrategy::Savepoints),
            "none" => Ok(NestedStrategy::None),
            _ => Err(format!("Unknown nested transaction strategy: {}", s)),
        }
    }
}

/// Transaction state stored in the context.
pub(crate) struct TxHandle {
    pub(crate) session: Arc<dyn TxSession>,
    pub(crate) depth: u32,
    pub(crate) hooks: PostCommit,
}

/// Copy of `ctx` that no longer joins its transaction or inherits the
/// request deadline. Work that outlives the scope (subscribers, hooks) must
/// run on a detached context.
pub fn detach(ctx: &Context) -> Context {
    ctx.without_value::<TxHandle>().without_deadline()
}

#[derive(Clone)]
pub struct Transactor {
    backend: Arc<dyn TxBackend>,
    strategy: NestedStrategy,
    tasks: BackgroundTasks,
}

impl Transactor {
    pub fn new(backend: Arc<dyn TxBackend>, strategy: NestedStrategy) -> Self {
        Self {
            backend,
            strategy,
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn strategy(&self) -> NestedStrategy {
        self.strategy
    }

    /// Whether `ctx` is inside a `within_transaction` scope.
    pub fn in_transaction(ctx: &Context) -> bool {
        ctx.value::<TxHandle>().is_some()
    }

    /// Run `f` inside a transaction.
    ///
    /// The outermost call commits when `f` succeeds and rolls back when it
    /// fails. Nested calls follow the configured `NestedStrategy`. Hooks
    /// registered on the `PostCommit` run on a detached task, in registration
    /// order, once the outermost commit succeeded; they never run otherwise.
    pub async fn within_transaction<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(Context, PostCommit) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        if ctx.is_expired() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "request deadline exceeded before transaction start"
            )));
        }

        match ctx.value::<TxHandle>() {
            None => self.run_outermost(ctx, f).await,
            Some(parent) => self.run_nested(ctx, &parent, f).await,
        }
    }

    async fn run_outermost<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(Context, PostCommit) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let session = self.backend.begin().await.map_err(|e| {
            tracing::error!(parent: &ctx.logger(), error = %e, "Failed to begin transaction");
            e
        })?;

        let hooks = PostCommit::new();
        let tx_ctx = ctx.with_value(TxHandle {
            session: session.clone(),
            depth: 0,
            hooks: hooks.clone(),
        });

        match f(tx_ctx, hooks.clone()).await {
            Ok(value) => {
                if let Err(e) = session.commit().await {
                    metrics::counter!("payroll_transactions_total", "outcome" => "commit_failed")
                        .increment(1);
                    tracing::error!(parent: &ctx.logger(), error = %e, "Commit failed");
                    return Err(e);
                }
                metrics::counter!("payroll_transactions_total", "outcome" => "committed")
                    .increment(1);

                let pending = hooks.take();
                if !pending.is_empty() {
                    tracing::debug!(parent: &ctx.logger(), hooks = pending.len(), "Scheduling post-commit hooks");
                    self.tasks
                        .spawn("post_commit", ctx.logger(), hooks::run_hooks(pending));
                }
                Ok(value)
            }
            Err(err) => {
                metrics::counter!("payroll_transactions_total", "outcome" => "rolled_back")
                    .increment(1);
                if let Err(rollback_err) = session.rollback().await {
                    tracing::error!(
                        parent: &ctx.logger(),
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_nested<T, F, Fut>(&self, ctx: &Context, parent: &TxHandle, f: F) -> Result<T>
    where
        F: FnOnce(Context, PostCommit) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let scope = PostCommit::new();

        if self.strategy == NestedStrategy::None {
            let inner_ctx = ctx.with_value(TxHandle {
                session: parent.session.clone(),
                depth: parent.depth,
                hooks: scope.clone(),
            });
            let value = f(inner_ctx, scope.clone()).await?;
            parent.hooks.append(scope.take());
            return Ok(value);
        }

        let depth = parent.depth + 1;
        let savepoint = format!("sp_{depth}");
        parent.session.savepoint(&savepoint).await?;

        let inner_ctx = ctx.with_value(TxHandle {
            session: parent.session.clone(),
            depth,
            hooks: scope.clone(),
        });

        match f(inner_ctx, scope.clone()).await {
            Ok(value) => {
                parent.session.release_savepoint(&savepoint).await?;
                parent.hooks.append(scope.take());
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(parent: &ctx.logger(), savepoint = %savepoint, error = %err, "Rolling back savepoint");
                parent.session.rollback_to_savepoint(&savepoint).await?;
                Err(err)
            }
        }
    }

    /// Wait for scheduled post-commit hooks, up to `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.drain(timeout).await
    }
}
