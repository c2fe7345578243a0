//! Traced pooled connections.
//!
//! Wraps a `deadpool_postgres::Pool` so every statement an entity issues is
//! logged via tracing, and adapts connections to the [`Driver`] seam.

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tracing::Instrument;

use crate::row::from_pg_row;
use crate::{Driver, Result, RowData, SqlParam, Value};

/// A traced connection pool.
///
/// The pool's configured maximum bounds how many statements run at once;
/// operations hold a connection only for their single round trip.
#[derive(Clone)]
pub struct TracedPool {
    inner: deadpool_postgres::Pool,
}

impl TracedPool {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { inner: pool }
    }

    /// Get a traced connection from the pool.
    pub async fn get(&self) -> Result<TracedConn> {
        let conn = self.inner.get().await?;
        Ok(TracedConn { inner: conn })
    }

    /// The raw pool, for callers that need it.
    pub fn inner(&self) -> &deadpool_postgres::Pool {
        &self.inner
    }
}

/// A traced connection that owns the underlying pooled object.
pub struct TracedConn {
    inner: deadpool_postgres::Object,
}

impl TracedConn {
    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        let owned: Vec<SqlParam> = params.iter().map(SqlParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        use std::ops::Deref;
        let client: &tokio_postgres::Client = self.inner.deref();
        let affected = client.execute(sql, &refs).instrument(span.clone()).await?;
        span.record("affected", affected);
        Ok(affected)
    }

    /// Execute a query, returning all rows.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let owned: Vec<SqlParam> = params.iter().map(SqlParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        use std::ops::Deref;
        let client: &tokio_postgres::Client = self.inner.deref();
        let rows = client.query(sql, &refs).instrument(span.clone()).await?;
        span.record("rows", rows.len());
        rows.iter().map(from_pg_row).collect()
    }
}

#[async_trait]
impl Driver for TracedConn {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        TracedConn::execute(self, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>> {
        TracedConn::query(self, sql, params).await
    }
}

/// Running an operation directly against the pool checks out a connection
/// for just that statement.
#[async_trait]
impl Driver for TracedPool {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.get().await?.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<RowData>> {
        self.get().await?.query(sql, params).await
    }
}
