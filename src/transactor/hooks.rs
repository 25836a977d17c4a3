//! Post-commit hook collection

use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

pub(crate) type Hook = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Hooks registered inside one `within_transaction` scope, in insertion order.
///
/// A nested scope hands its hooks to the parent when it succeeds and drops
/// them when it fails. Only the outermost scope ever runs them, and only
/// after its commit succeeded.
#[derive(Clone, Default)]
pub struct PostCommit {
    hooks: Arc<Mutex<Vec<Hook>>>,
}

impl PostCommit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Defer `hook` until the outermost transaction commits.
    pub fn register<F, Fut>(&self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed: Hook = Box::new(move || hook().boxed());
        self.lock().push(boxed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn take(&self) -> Vec<Hook> {
        std::mem::take(&mut *self.lock())
    }

    pub(crate) fn append(&self, hooks: Vec<Hook>) {
        self.lock().extend(hooks);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Hook>> {
        // A poisoned list only means a registering task panicked; the Vec is intact.
        self.hooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Run hooks one after another. Failures and panics are logged and do not
/// stop the remaining hooks.
pub(crate) async fn run_hooks(hooks: Vec<Hook>) {
    let total = hooks.len();
    for (index, hook) in hooks.into_iter().enumerate() {
        let outcome = AssertUnwindSafe(async move { hook().await })
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                metrics::counter!("payroll_post_commit_hooks_total", "outcome" => "ok").increment(1);
            }
            Ok(Err(e)) => {
                metrics::counter!("payroll_post_commit_hooks_total", "outcome" => "error")
                    .increment(1);
                tracing::warn!(hook = index, total, error = %e, "Post-commit hook failed");
            }
            Err(panic) => {
                metrics::counter!("payroll_post_commit_hooks_total", "outcome" => "panic")
                    .increment(1);
                tracing::error!(
                    hook = index,
                    total,
                    panic = %crate::background::panic_message(panic.as_ref()),
                    "Post-commit hook panicked"
                );
            }
        }
    }
}

impl std::fmt::Debug for PostCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostCommit").field("pending", &self.len()).finish()
    }
}
