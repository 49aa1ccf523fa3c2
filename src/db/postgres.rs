//! PostgreSQL driver via sqlx.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::db::{
    CloseError, ConnectError, ConnectionDescriptor, Connector, DatabasePool, QueryError, Table,
    DEFAULT_CONNECT_TIMEOUT,
};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Opens sqlx PostgreSQL pools.
#[derive(Debug, Clone)]
pub struct PgConnector {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            max_connections,
            acquire_timeout,
        }
    }
}

impl Default for PgConnector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS, DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for PgConnector {
    fn connect<'a>(
        &'a self,
        descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DatabasePool>, ConnectError>> {
        Box::pin(async move {
            match descriptor.scheme().as_deref() {
                Some("postgres") | Some("postgresql") => {}
                Some(other) => return Err(ConnectError::UnsupportedScheme(other.to_string())),
                None => return Err(ConnectError::UnsupportedScheme(String::new())),
            }

            let pool = PgPoolOptions::new()
                .max_connections(self.max_connections)
                .acquire_timeout(self.acquire_timeout)
                .connect(descriptor.as_str())
                .await
                .map_err(|e| ConnectError::Driver(e.to_string()))?;

            Ok(Box::new(PgDatabase { pool }) as Box<dyn DatabasePool>)
        })
    }
}

struct PgDatabase {
    pool: PgPool,
}

impl DatabasePool for PgDatabase {
    fn probe(&self) -> BoxFuture<'_, Result<(), QueryError>> {
        Box::pin(async move {
            sqlx::query("SELECT NOW()")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(QueryError::from)
        })
    }

    fn fetch_all(&self, table: Table) -> BoxFuture<'_, Result<Vec<Value>, QueryError>> {
        Box::pin(async move {
            let sql = format!("SELECT row_to_json(t) FROM (SELECT * FROM {}) t", table.name());
            sqlx::query_scalar::<_, Value>(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(QueryError::from)
        })
    }

    fn fetch_one(&self, table: Table, id: i64) -> BoxFuture<'_, Result<Option<Value>, QueryError>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT row_to_json(t) FROM (SELECT * FROM {} WHERE id = $1) t",
                table.name()
            );
            sqlx::query_scalar::<_, Value>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), CloseError>> {
        Box::pin(async move {
            self.pool.close().await;
            Ok(())
        })
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(e: sqlx::Error) -> Self {
        QueryError(e.to_string())
    }
}
