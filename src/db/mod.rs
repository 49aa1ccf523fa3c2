//! Database subsystem.
//!
//! # Data Flow
//! ```text
//! Settings.database_url
//!     → descriptor.rs (canonical ConnectionDescriptor)
//!     → pool.rs (ResourcePool: Closed → Opening → Open → Closing → Closed)
//!     → Connector / DatabasePool (postgres.rs in production)
//!
//! Request handlers:
//!     → ResourcePool::fetch_all / fetch_one
//!     → NotConnected while no handle is Open (mock.rs rows may stand in)
//! ```
//!
//! # Design Decisions
//! - The driver sits behind a trait seam so reconnection logic is testable
//! - Connection failures degrade to `db_connected = false`, never a crash
//! - Rows travel as JSON objects; tables are a closed enum

pub mod descriptor;
pub mod mock;
pub mod pool;
pub mod postgres;

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

pub use descriptor::ConnectionDescriptor;
pub use pool::{ReconcileOutcome, ResourcePool, ResourceState};
pub use postgres::PgConnector;

/// Bound on connect and liveness probe.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    #[error("no driver for scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Driver(String),

    #[error("liveness probe failed: {0}")]
    Probe(#[from] QueryError),
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct QueryError(pub String);

#[derive(Debug, Clone, Error)]
#[error("failed to close pool: {0}")]
pub struct CloseError(pub String);

/// Why a data request could not be answered from the database.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("database not connected")]
    NotConnected,

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Tables exposed through the data endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Products,
    Tasks,
    Posts,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Users, Table::Products, Table::Tasks, Table::Posts];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Products => "products",
            Table::Tasks => "tasks",
            Table::Posts => "posts",
        }
    }

    /// Singular label used in "not found" messages.
    pub fn label(&self) -> &'static str {
        match self {
            Table::Users => "User",
            Table::Products => "Product",
            Table::Tasks => "Task",
            Table::Posts => "Post",
        }
    }
}

/// Opens pools for a descriptor.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DatabasePool>, ConnectError>>;
}

/// An open connection pool.
pub trait DatabasePool: Send + Sync {
    /// One cheap round trip proving the pool can serve queries.
    fn probe(&self) -> BoxFuture<'_, Result<(), QueryError>>;

    fn fetch_all(&self, table: Table) -> BoxFuture<'_, Result<Vec<Value>, QueryError>>;

    fn fetch_one(&self, table: Table, id: i64) -> BoxFuture<'_, Result<Option<Value>, QueryError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), CloseError>>;
}

#[cfg(test)]
pub(crate) mod testing;
