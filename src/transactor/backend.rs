//! Transaction backend seam
//!
//! The transactor only needs to begin a transaction and drive savepoints on
//! it. `SqlxBackend` does that against a real pool, `MemoryBackend` records
//! the calls for tests of handlers that never touch SQL.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::any::Any;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait TxSession: Send + Sync + 'static {
    async fn savepoint(&self, name: &str) -> Result<()>;
    async fn release_savepoint(&self, name: &str) -> Result<()>;
    async fn rollback_to_savepoint(&self, name: &str) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;

    /// Lets `DbContext` recover the concrete session type.
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait TxBackend: Send + Sync + 'static {
    async fn begin(&self) -> Result<Arc<dyn TxSession>>;
}

/// Backend that performs no I/O and records every operation.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    log: Arc<Mutex<Vec<String>>>,
    fail_commit: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations issued so far, e.g. `["begin", "savepoint sp_1", "commit"]`.
    pub fn operations(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Make every following commit fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn record(&self, op: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(op);
        }
    }
}

struct MemorySession {
    backend: MemoryBackend,
}

#[async_trait]
impl TxSession for MemorySession {
    async fn savepoint(&self, name: &str) -> Result<()> {
        self.backend.record(format!("savepoint {name}"));
        Ok(())
    }

    async fn release_savepoint(&self, name: &str) -> Result<()> {
        self.backend.record(format!("release {name}"));
        Ok(())
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.backend.record(format!("rollback to {name}"));
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        if self
            .backend
            .fail_commit
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            self.backend.record("commit failed".to_string());
            return Err(AppError::Internal(anyhow::anyhow!("commit failed")));
        }
        self.backend.record("commit".to_string());
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.backend.record("rollback".to_string());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl TxBackend for MemoryBackend {
    async fn begin(&self) -> Result<Arc<dyn TxSession>> {
        self.record("begin".to_string());
        Ok(Arc::new(MemorySession {
            backend: self.clone(),
        }))
    }
}
