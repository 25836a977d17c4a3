//! sqlx-backed transactions and the per-call connection accessor

use super::backend::{TxBackend, TxSession};
use super::TxHandle;
use crate::context::Context;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Database, Executor, Pool, Transaction};
use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};

type TxSlot<DB> = Arc<Mutex<Option<Transaction<'static, DB>>>>;

/// Opens transactions on a sqlx pool.
pub struct SqlxBackend<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> SqlxBackend<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }
}

/// One open sqlx transaction. The slot empties once committed or rolled back.
pub struct SqlxSession<DB: Database> {
    tx: TxSlot<DB>,
}

impl<DB> SqlxSession<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    async fn execute_raw(&self, sql: &str) -> Result<()> {
        let mut slot = self.tx.lock().await;
        let tx = slot
            .as_mut()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("transaction already finished")))?;
        let conn: &mut DB::Connection = &mut **tx;
        conn.execute(sql).await?;
        Ok(())
    }

    async fn take(&self) -> Result<Transaction<'static, DB>> {
        self.tx
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("transaction already finished")))
    }
}

#[async_trait]
impl<DB> TxSession for SqlxSession<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    async fn savepoint(&self, name: &str) -> Result<()> {
        self.execute_raw(&format!("SAVEPOINT {name}")).await
    }

    async fn release_savepoint(&self, name: &str) -> Result<()> {
        self.execute_raw(&format!("RELEASE SAVEPOINT {name}")).await
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.execute_raw(&format!("ROLLBACK TO SAVEPOINT {name}")).await
    }

    async fn commit(&self) -> Result<()> {
        self.take().await?.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.take().await?.rollback().await?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl<DB> TxBackend for SqlxBackend<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    async fn begin(&self) -> Result<Arc<dyn TxSession>> {
        let tx = self.pool.begin().await?;
        Ok(Arc::new(SqlxSession::<DB> {
            tx: Arc::new(Mutex::new(Some(tx))),
        }))
    }
}

/// Connection handed to a repository for one call: the running transaction
/// when the context carries one, otherwise a pooled connection.
pub enum DbConn<DB: Database> {
    Pooled(PoolConnection<DB>),
    Tx(OwnedMappedMutexGuard<Option<Transaction<'static, DB>>, DB::Connection>),
}

impl<DB: Database> DbConn<DB> {
    pub fn in_transaction(&self) -> bool {
        matches!(self, DbConn::Tx(_))
    }
}

impl<DB: Database> Deref for DbConn<DB> {
    type Target = DB::Connection;

    fn deref(&self) -> &Self::Target {
        match self {
            DbConn::Pooled(conn) => &**conn,
            DbConn::Tx(conn) => &**conn,
        }
    }
}

impl<DB: Database> DerefMut for DbConn<DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            DbConn::Pooled(conn) => &mut **conn,
            DbConn::Tx(conn) => &mut **conn,
        }
    }
}

/// Repositories hold a `DbContext` and ask it for a connection on every
/// call, so the same code runs inside or outside `within_transaction`.
pub struct DbContext<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> Clone for DbContext<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB> DbContext<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub async fn acquire(&self, ctx: &Context) -> Result<DbConn<DB>> {
        if ctx.is_expired() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "request deadline exceeded before database call"
            )));
        }

        if let Some(handle) = ctx.value::<TxHandle>() {
            if let Some(session) = handle.session.as_any().downcast_ref::<SqlxSession<DB>>() {
                let guard: OwnedMutexGuard<_> = session.tx.clone().lock_owned().await;
                let mapped = OwnedMutexGuard::try_map(guard, |slot| {
                    slot.as_mut().map(|tx| &mut **tx)
                })
                .map_err(|_| {
                    AppError::Internal(anyhow::anyhow!("transaction already finished"))
                })?;
                return Ok(DbConn::Tx(mapped));
            }
            tracing::debug!("Transaction in context belongs to another backend, using pool");
        }

        let conn = match ctx.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, self.pool.acquire())
                .await
                .map_err(|_| {
                    AppError::Internal(anyhow::anyhow!("request deadline exceeded"))
                })??,
            None => self.pool.acquire().await?,
        };
        Ok(DbConn::Pooled(conn))
    }
}
